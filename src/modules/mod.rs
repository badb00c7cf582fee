pub mod articles;
pub mod books;
pub mod documents;
pub mod libraries;
pub mod plans;
pub mod users;

use bookcat_kernel::ModuleRegistry;

use crate::state::AppState;

/// Register every application module. Tables referenced by foreign keys are
/// created by modules registered earlier.
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) {
    registry.register(users::create_module(state.clone()));
    registry.register(plans::create_module(state.clone()));
    registry.register(libraries::create_module(state.clone()));
    registry.register(books::create_module(state.clone()));
    registry.register(documents::create_module(state.clone()));
    registry.register(articles::create_module(state.clone()));
}
