use scenesync_sync::{Category, CategoryFilter, FilterConfig, FilterRule};

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

fn filter_with(adjust: impl FnOnce(&mut FilterConfig)) -> CategoryFilter {
    let mut config = FilterConfig::default();
    adjust(&mut config);
    CategoryFilter::new(&config)
}

// ── Membership ──────────────────────────────────────────────────

#[test]
fn listed_class_in_enabled_category_syncs() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("Part", &[]);
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::Membership);
}

#[test]
fn listed_class_only_in_disabled_category_is_denied() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("Terrain", &[]);
    assert!(!decision.allowed);
    assert_eq!(decision.rule, FilterRule::Membership);
}

#[test]
fn class_in_any_enabled_category_syncs() {
    let filter = filter_with(|config| {
        config.categories.push(Category::new("Extra", false, &["Part"]));
    });
    assert!(filter.should_sync("Part", &[]));
}

#[test]
fn owning_category_is_first_registered() {
    let filter = filter_with(|config| {
        config.categories.push(Category::new("Extra", true, &["Part"]));
    });
    assert_eq!(filter.owning_category("Part"), Some("Parts"));
    assert_eq!(filter.owning_category("Nope"), None);
}

// ── Catch-all ───────────────────────────────────────────────────

#[test]
fn unknown_class_defers_to_catch_all() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("Workspace", &[]);
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::CatchAll);

    let filter = filter_with(|config| {
        config.set_enabled("Other", false);
    });
    assert!(!filter.should_sync("Workspace", &[]));
}

#[test]
fn missing_catch_all_category_denies() {
    let filter = filter_with(|config| config.catch_all = "Nowhere".to_string());
    assert!(!filter.should_sync("Workspace", &[]));
}

// ── Abstract tag ────────────────────────────────────────────────

#[test]
fn abstract_tag_routes_through_abstract_category() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("Folder", &tags(&["Abstract"]));
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::AbstractTag);
}

#[test]
fn abstract_tag_on_unregistered_class_falls_through() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("Part", &tags(&["Abstract"]));
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::Membership);
}

#[test]
fn abstract_tag_with_disabled_category_falls_through() {
    let filter = filter_with(|config| {
        config.set_enabled("Abstract", false);
    });
    let decision = filter.decide("Folder", &tags(&["Abstract"]));
    assert!(!decision.allowed);
    assert_eq!(decision.rule, FilterRule::Membership);
}

#[test]
fn abstract_tag_beats_dual_gate() {
    let filter = filter_with(|config| {
        config.categories[8].classes.push("SurfaceGui".to_string());
        config.set_enabled("Parts", false);
    });
    let decision = filter.decide("SurfaceGui", &tags(&["Abstract"]));
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::AbstractTag);
}

// ── Dual gate ───────────────────────────────────────────────────

#[test]
fn dual_gated_class_requires_both_categories() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("SurfaceGui", &[]);
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::DualGate);

    for off in ["Gui", "Parts"] {
        let filter = filter_with(|config| {
            config.set_enabled(off, false);
        });
        assert!(!filter.should_sync("BillboardGui", &[]), "{off} disabled");
    }
}

// ── Supertypes ──────────────────────────────────────────────────

#[test]
fn unlisted_subtype_follows_its_base_category() {
    let filter = CategoryFilter::default();
    let decision = filter.decide("VehicleSeat", &[]);
    assert!(decision.allowed);
    assert_eq!(decision.rule, FilterRule::Supertype);

    let filter = filter_with(|config| {
        config.set_enabled("Parts", false);
    });
    assert!(!filter.should_sync("VehicleSeat", &[]));
}

#[test]
fn supertype_chain_is_followed() {
    let filter = CategoryFilter::default();
    assert_eq!(filter.decide("NegateOperation", &[]).rule, FilterRule::Supertype);
    assert_eq!(filter.owning_category("NegateOperation"), Some("Parts"));
}

#[test]
fn supertype_cycle_defers_to_catch_all() {
    let filter = filter_with(|config| {
        config.superclasses.insert("Alpha".to_string(), "Beta".to_string());
        config.superclasses.insert("Beta".to_string(), "Alpha".to_string());
    });
    assert_eq!(filter.decide("Alpha", &[]).rule, FilterRule::CatchAll);
}

// ── Configuration ───────────────────────────────────────────────

#[test]
fn set_enabled_reports_unknown_category() {
    let mut config = FilterConfig::default();
    assert!(config.set_enabled("Parts", false));
    assert!(!config.set_enabled("Vehicles", false));
}

#[test]
fn filter_config_serde_roundtrip() {
    let config = FilterConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: FilterConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.categories.len(), config.categories.len());
    assert_eq!(back.catch_all, "Other");
}
