// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::op_ref
)]

//! Turns a set of located records into map markers, group colours and route polylines.

pub mod canvas;
pub mod config;
pub mod data_load;
pub mod directions;
pub mod errors;
pub mod grouping;
pub mod map_state;
pub mod placement;
pub mod records;
pub mod renderer;
pub mod route_polyline;

pub use data_load::{DataLoadCoordinator, LoadOutcome};
pub use map_state::MapState;
pub use placement::{MarkerDescriptor, MarkerPlacementPipeline};
pub use records::{LatLng, Record, RecordId};
