use crate::records::{Record, SERVER_DATETIME_FORMAT, parse_server_datetime};
use chrono::TimeZone;
use chrono_tz::Tz;
use log::debug;
use serde_json::Value;

/// Rewrites datetime fields from the source time zone into the display time zone.
///
/// Values keep the `%Y-%m-%d %H:%M:%S` shape so grouping parses them the same way.
pub fn localize_datetime_fields(
    records: &mut [Record],
    datetime_fields: &[String],
    from: Tz,
    to: Tz,
) {
    if datetime_fields.is_empty() || from == to {
        return;
    }

    for record in records.iter_mut() {
        for field in datetime_fields {
            let Some(Value::String(raw)) = record.fields.get_mut(field) else {
                continue;
            };

            match convert(raw, from, to) {
                Some(local) => *raw = local,
                None => debug!("record {} has unparseable {} '{}'", record.id, field, raw),
            }
        }
    }
}

fn convert(raw: &str, from: Tz, to: Tz) -> Option<String> {
    let naive = parse_server_datetime(raw)?;

    // earliest reading of a wall time repeated by a DST change
    let source = from.from_local_datetime(&naive).earliest()?;

    Some(
        source
            .with_timezone(&to)
            .format(SERVER_DATETIME_FORMAT)
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn utc_to_brussels() {
        let mut records = vec![
            Record::new(1).with_field("create_date", json!("2024-01-31 23:30:00")),
            Record::new(2).with_field("create_date", json!(false)),
            Record::new(3).with_field("create_date", json!("2024-07-01 12:00:00")),
        ];

        localize_datetime_fields(
            &mut records,
            &["create_date".to_string()],
            chrono_tz::UTC,
            chrono_tz::Europe::Brussels,
        );

        assert_eq!(records[0].field("create_date"), &json!("2024-02-01 00:30:00"));
        assert_eq!(records[1].field("create_date"), &json!(false));
        assert_eq!(records[2].field("create_date"), &json!("2024-07-01 14:00:00"));
    }

    #[test]
    fn garbage_is_left_alone() {
        let mut records = vec![Record::new(1).with_field("when", json!("tomorrow"))];
        localize_datetime_fields(
            &mut records,
            &["when".to_string()],
            chrono_tz::UTC,
            chrono_tz::Asia::Tokyo,
        );
        assert_eq!(records[0].field("when"), &json!("tomorrow"));
    }
}
