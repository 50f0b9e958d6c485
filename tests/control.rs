use mealdrive::{
    Catalog, ControlBlock, DocumentId, Engine, ErrorKind, Restaurant, User, Value, Version,
};

fn doc() -> DocumentId {
    DocumentId::new("Drivers").with_post(1)
}

fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .add_user(User::new("jsmith").with_phone("555-0100"))
        .add_user(User::new("Alice"))
        .add_user(User::new("bob"))
        .add_restaurant(Restaurant::new("Bopshop"))
        .add_restaurant(Restaurant::new("Noodles"));
    catalog
}

#[test]
fn audit_backup_driver_known() {
    let block = ControlBlock::parse("backup-driver=Alice", doc()).unwrap();
    block.audit(&catalog()).unwrap();
}

#[test]
fn audit_backup_driver_unknown() {
    let block = ControlBlock::parse("backup-driver=Alice", doc()).unwrap();
    let mut catalog = Catalog::new();
    catalog.add_user(User::new("bob"));
    let err = block.audit(&catalog).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Audit);
    assert_eq!(err.diagnostics().len(), 1);
    assert!(err.diagnostics()[0].message().contains("Alice"));
    assert_eq!(
        err.to_string(),
        "Drivers post 1 line 1:0 backup driver `Alice` is not a known user"
    );
}

#[test]
fn audit_split_restaurant() {
    let block = ControlBlock::parse(
        "split-restaurant=Bopshop|bob\nsplit-restaurant=Tacos|Alice\nsplit-restaurant=Noodles|dan",
        doc(),
    )
    .unwrap();
    let err = block.audit(&catalog()).unwrap_err();
    let messages: Vec<_> = err.diagnostics().iter().map(|d| d.message()).collect();
    assert_eq!(
        messages,
        [
            "split restaurant `Tacos` is not a known restaurant",
            "cleanup driver for `Noodles` `dan` is not a known user",
        ]
    );
}

#[test]
fn audit_v200_ignores_pickup_rules() {
    let block = ControlBlock::parse("ops-manager=jsmith|555-0100", doc()).unwrap();
    assert_eq!(block.version(), Version::V200);
    block.audit(&catalog()).unwrap();
}

#[test]
fn duplicate_ops_manager_names_both_lines() {
    let err = ControlBlock::parse(
        "ops-manager=jsmith|555-0100\n# comment\nops-manager=bob|555-0199",
        doc(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Directive);
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(
        err.to_string(),
        "Drivers post 1 line 3:0 duplicate `ops-manager` directive on line 3, first set on line 1
ops-manager=bob|555-0199
^^^^^^^^^^^"
    );
}

#[test]
fn alt_meal_options_accumulate() {
    let block = ControlBlock::parse(
        "version=300\nalt-meal-options=Veg, Vegan\nalt-meal-options=GlutenFree",
        doc(),
    )
    .unwrap();
    assert_eq!(block.alt_meal_options(), ["Veg", "Vegan", "GlutenFree"]);
}

#[test]
fn directive_errors_are_raised_together() {
    let err = ControlBlock::parse(
        "colour=blue\nops-manager=a|1\nops-manager=b|2\nalt-meal-options=Veg",
        doc(),
    )
    .unwrap_err();
    let lines: Vec<_> = err.diagnostics().iter().map(|d| d.line()).collect();
    assert_eq!(lines, [1, 3, 4]);
    let messages: Vec<_> = err.diagnostics().iter().map(|d| d.message()).collect();
    assert_eq!(
        messages,
        [
            "unknown directive `colour`",
            "duplicate `ops-manager` directive on line 3, first set on line 2",
            "unknown directive `alt-meal-options` for version 200",
        ]
    );
}

#[test]
fn control_block_drives_template() {
    let block = ControlBlock::parse(
        "version = 300\n\
         ops-manager = jsmith | 555-0100\n\
         backup-driver = Alice, bob\n\
         pickup-managers = bob|Noodles\n\
         start-times = 3:00pm, 3:30pm",
        doc(),
    )
    .unwrap();
    block.audit(&catalog()).unwrap();

    let template = Engine::new()
        .parse(
            "Version ${ControlBlockVersion}. \
             &{IF HasOpsManager}Questions: ${OpsManagerUserName} (${OpsManagerPhone}). &{ENDIF}\
             &{IF HasBackupDrivers}Backups: ${BackupDrivers}. &{ENDIF}\
             &{IF NOT HasSplitRestaurants}No splits. &{ENDIF}\
             &{IF HasAltMealOptions}Alt meals: ${AltMealOptions}. &{ENDIF}\
             Start at ${StartTimes}.",
            DocumentId::new("Drivers").with_post(2),
        )
        .unwrap();

    let result = template.render(&block.bindings()).unwrap();
    assert_eq!(
        result,
        "Version 300. Questions: jsmith (555-0100). Backups: Alice, bob. No splits. \
         Start at 3:00pm, 3:30pm."
    );
}

#[test]
fn v300_template_on_v200_block_is_unresolved() {
    let block = ControlBlock::parse("backup-driver=Alice", doc()).unwrap();
    let err = Engine::new()
        .parse("&{IF HasAltMealOptions}x&{ENDIF}", doc())
        .unwrap()
        .render(&block.bindings())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedBinding);
}

#[test]
fn bindings_extend_caller_context() {
    let block = ControlBlock::parse("backup-driver=Alice", doc()).unwrap();
    let mut ctx = mealdrive::context! { DriverName: "bob" };
    ctx.merge(block.bindings());
    assert_eq!(ctx.get("DriverName"), Some(&Value::from("bob")));
    assert_eq!(ctx.get("HasBackupDrivers"), Some(&Value::Bool(true)));
}
