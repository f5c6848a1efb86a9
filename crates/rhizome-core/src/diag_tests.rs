use crate::diag::Diagnostics;

#[test]
fn find_matches_stable_identifier() {
    let mut diags = Diagnostics::new();
    diags.warning("CSTRNBIN", 1, "constraints not saved");
    diags.error("BLOAD", 2, "not a binary construct file");

    assert!(diags.find("BLOAD", 2).is_some());
    assert!(diags.find("BLOAD", 3).is_none());
    assert!(diags.find("CSTRNBIN", 1).unwrap().is_warning());
}

#[test]
fn severity_counters() {
    let mut diags = Diagnostics::new();
    assert!(!diags.has_errors());

    diags.warning("BLOAD", 5, "skipping block");
    assert!(!diags.has_errors());
    assert_eq!(diags.warning_count(), 1);

    diags.error("BLOAD", 6, "missing functions");
    assert!(diags.has_errors());
    assert_eq!(diags.len(), 2);
}
