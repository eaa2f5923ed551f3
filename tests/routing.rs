//! Integration tests for `src/routing/`.

#[path = "routing/reflection_test.rs"]
mod reflection_test;
#[path = "routing/router_test.rs"]
mod router_test;
