//! Document id helpers.

use crate::Result;
use chrono::{DateTime, TimeZone};
use mongodb::bson::{self, Bson, oid::ObjectId};

/// Whether `id` is an `ObjectId` or a string of exactly 24 hexadecimal digits.
pub fn is_valid_object_id(id: &Bson) -> bool {
    match id {
        Bson::ObjectId(_) => true,
        Bson::String(id) => is_object_id_hex(id),
        _ => false,
    }
}

pub(crate) fn is_object_id_hex(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|byte| byte.is_ascii_hexdigit())
}

/// Converts a date-time to a BSON date, truncated to whole seconds.
pub fn convert_datetime<Tz: TimeZone>(date_time: &DateTime<Tz>) -> bson::DateTime {
    bson::DateTime::from_millis(date_time.timestamp() * 1000)
}

/// Applies the implicit object id policy: strings become `ObjectId`s, anything else is kept.
pub(crate) fn normalize(id: Bson, implicit: bool) -> Result<Bson> {
    match id {
        Bson::String(id) if implicit => Ok(Bson::ObjectId(ObjectId::parse_str(id)?)),
        id => Ok(id),
    }
}

pub(crate) fn stringify(id: &Bson) -> String {
    match id {
        Bson::ObjectId(id) => id.to_hex(),
        Bson::String(id) => id.clone(),
        id => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    #[test]
    fn object_ids_are_valid() {
        assert!(is_valid_object_id(&Bson::ObjectId(ObjectId::new())));
        assert!(is_valid_object_id(&Bson::String("545eb081631d16153a293a66".into())));
        assert!(is_valid_object_id(&Bson::String("545EB081631D16153A293A66".into())));
    }

    #[test]
    fn other_values_are_invalid() {
        assert!(!is_valid_object_id(&Bson::String("not-24-hex-chars".into())));
        assert!(!is_valid_object_id(&Bson::String("545eb081631d16153a293a6".into())));
        assert!(!is_valid_object_id(&Bson::Int32(5)));
        assert!(!is_valid_object_id(&Bson::Null));
    }

    #[test]
    fn normalize_follows_policy() {
        let hex = "545eb081631d16153a293a66";

        assert_eq!(
            normalize(Bson::String(hex.into()), true).unwrap(),
            Bson::ObjectId(ObjectId::parse_str(hex).unwrap())
        );
        assert_eq!(
            normalize(Bson::String(hex.into()), false).unwrap(),
            Bson::String(hex.into())
        );
        assert_eq!(normalize(Bson::Int32(7), true).unwrap(), Bson::Int32(7));
        assert!(normalize(Bson::String("robot-1".into()), true).is_err());
    }

    #[test]
    fn convert_datetime_drops_subseconds() {
        let now = Utc::now();
        let converted = convert_datetime(&now);

        assert_eq!(converted.timestamp_millis(), now.timestamp() * 1000);
    }

    proptest! {
        #[test]
        fn any_24_hex_string_is_valid(id in "[a-fA-F0-9]{24}") {
            prop_assert!(is_valid_object_id(&Bson::String(id.clone())));
            prop_assert!(normalize(Bson::String(id), true).is_ok());
        }

        #[test]
        fn other_lengths_are_invalid(id in "[a-f0-9]{0,23}|[a-f0-9]{25,40}") {
            prop_assert!(!is_valid_object_id(&Bson::String(id)));
        }

        #[test]
        fn stringified_object_ids_round_trip(bytes in any::<[u8; 12]>()) {
            let id = ObjectId::from_bytes(bytes);
            prop_assert_eq!(stringify(&Bson::ObjectId(id)), id.to_hex());
            prop_assert!(is_valid_object_id(&Bson::String(stringify(&Bson::ObjectId(id)))));
        }
    }
}
