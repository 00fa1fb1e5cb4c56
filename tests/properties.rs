//! Property tests for filtering, ordering and draft validation.

use bulletin::{
    build_query, normalize_building, AnnouncementStore, Building, Composer, Draft, NewAnnouncement,
    SessionState, Store, ViewerSession,
};
use proptest::prelude::*;
use std::sync::Arc;

fn building_code() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ALL".to_string()),
        Just("all".to_string()),
        Just(String::new()),
        "[ \t]{0,2}[a-dA-D][0-9]{1,3}[ \t]{0,2}",
    ]
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in "\\PC{0,16}") {
        let once = normalize_building(&raw);
        prop_assert_eq!(normalize_building(&once), once);
    }

    #[test]
    fn blank_filter_has_no_query(raw in "[ \t\n]{0,8}") {
        prop_assert!(build_query(&raw).is_none());
    }

    #[test]
    fn visible_set_matches_filter(
        targets in proptest::collection::vec(building_code(), 0..24),
        filter in building_code(),
    ) {
        let store = Arc::new(Store::in_memory());
        for (i, target) in targets.iter().enumerate() {
            store
                .append(NewAnnouncement::new(format!("n{i}"), "body", Building::target_or_all(target)))
                .unwrap();
        }

        let session = ViewerSession::new(store.clone());
        session.set_filter(&filter).unwrap();
        session.poll();
        let visible = session.announcements();

        let key = normalize_building(&filter);
        if key.is_empty() {
            prop_assert_eq!(session.state(), SessionState::Idle);
            prop_assert!(visible.is_empty());
            prop_assert_eq!(store.subscription_count(), 0);
        } else {
            let expected: Vec<String> = targets
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, t)| {
                    let b = Building::target_or_all(t);
                    b.is_all() || b.as_str() == key
                })
                .map(|(i, _)| format!("n{i}"))
                .collect();
            let got: Vec<String> = visible.iter().map(|a| a.title.clone()).collect();
            prop_assert_eq!(got, expected);
            prop_assert!(visible.windows(2).all(|w| w[0].created_at > w[1].created_at));
        }
    }

    #[test]
    fn composer_appends_only_valid_drafts(
        title in "[ a-z]{0,6}",
        body in "[ a-z]{0,6}",
        building in building_code(),
    ) {
        let store = Arc::new(Store::in_memory());
        let composer = Composer::with_draft(
            store.clone(),
            Draft { title: title.clone(), body: body.clone(), building: building.clone(), ..Default::default() },
        );

        let valid = !title.trim().is_empty() && !body.trim().is_empty();
        let result = composer.submit();
        prop_assert_eq!(result.is_ok(), valid);
        prop_assert_eq!(store.len(), usize::from(valid));

        if let Ok(posted) = result {
            prop_assert_eq!(posted.title, title.trim());
            prop_assert_eq!(posted.body, body.trim());
            let expected = normalize_building(&building);
            if expected.is_empty() {
                prop_assert!(posted.building.is_all());
            } else {
                prop_assert_eq!(posted.building.as_str(), expected.as_str());
            }
        }
    }
}
