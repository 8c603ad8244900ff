// ABOUTME: Integration tests for validated names, identifiers and positions.
// ABOUTME: Tests parsing, validation, and label round trips.

use proptest::prelude::*;
use whaler::types::*;

mod names {
    use super::*;

    #[test]
    fn container_name_joins_service_and_app() {
        let app = AppName::new("shop").unwrap();
        let service = ServiceName::new("web").unwrap();
        assert_eq!(service.container_name(&app), "web.shop");
        assert_eq!(service.as_alias().as_str(), "web");
    }

    #[test]
    fn names_are_rejected_not_rewritten() {
        let err = AppName::new("My_App").unwrap_err();
        assert!(matches!(
            err,
            NameError::InvalidChars {
                kind: NameKind::Application,
                ..
            }
        ));
        assert!(matches!(
            ServiceName::new("").unwrap_err(),
            NameError::Empty(NameKind::Service)
        ));
    }

    #[test]
    fn names_deserialize_through_validation() {
        let ok: ServiceName = serde_json::from_str("\"db-1\"").unwrap();
        assert_eq!(ok.as_str(), "db-1");
        assert!(serde_json::from_str::<ServiceName>("\"DB\"").is_err());
    }

    proptest! {
        #[test]
        fn valid_charset_is_always_accepted(name in "[a-z0-9-]{1,40}") {
            prop_assert!(AppName::new(&name).is_ok());
            prop_assert!(ServiceName::new(&name).is_ok());
        }

        #[test]
        fn anything_with_other_chars_is_rejected(name in "[a-z]{0,5}[A-Z_. /]{1,3}[a-z]{0,5}") {
            prop_assert!(ServiceName::new(&name).is_err());
        }
    }
}

mod ids {
    use super::*;

    #[test]
    fn short_id_is_twelve_chars() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }
}

mod positions {
    use super::*;

    #[test]
    fn label_round_trip_keeps_nulls() {
        let position = Position::within(&["a", "b", "c"], "a");
        let label = position.to_label();
        assert_eq!(label, r#"{"after":null,"before":"b"}"#);
        assert_eq!(Position::from_label(Some(&label)), position);
    }

    #[test]
    fn missing_or_broken_labels_mean_no_neighbours() {
        assert_eq!(Position::from_label(None), Position::default());
        assert_eq!(Position::from_label(Some("not json")), Position::default());
    }

    #[test]
    fn unknown_service_has_no_neighbours() {
        assert_eq!(Position::within(&["a"], "z"), Position::default());
    }
}
