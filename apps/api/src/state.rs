use rolegate_application::RoleAssignmentGateway;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: RoleAssignmentGateway,
}
