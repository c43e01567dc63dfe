// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn always_is_true() {
    assert!(Always.should_subscribe());
}

#[test]
fn closures_are_predicates() {
    let never = || false;
    assert!(!never.should_subscribe());
}

#[test]
fn toggle_clones_share_state() {
    let toggle = Toggle::new(false);
    let predicate: Box<dyn ActivationPredicate> = Box::new(toggle.clone());
    assert!(!predicate.should_subscribe());

    toggle.set(true);
    assert!(predicate.should_subscribe());

    toggle.set(false);
    assert!(!predicate.should_subscribe());
}
