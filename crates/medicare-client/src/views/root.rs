use medicare_types::models::Role;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

/// Which screen the app shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Onboarding,
    Auth { role: Role, mode: AuthMode },
    PatientDashboard,
    CaretakerDashboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootState {
    session_role: Option<Role>,
    onboarded: bool,
    chosen_role: Role,
    mode: AuthMode,
}

impl Default for RootState {
    fn default() -> Self {
        Self {
            session_role: None,
            onboarded: false,
            chosen_role: Role::Patient,
            mode: AuthMode::Login,
        }
    }
}

impl RootState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the session store's current value. Losing a session (sign-out
    /// or expiry) returns to the role picker.
    pub fn observe_session(&mut self, session: Option<&Session>) {
        let had_session = self.session_role.is_some();
        self.session_role = session.map(|s| s.user.role);
        if self.session_role.is_none() {
            self.mode = AuthMode::Login;
            if had_session {
                self.onboarded = false;
            }
        }
    }

    /// Leave onboarding with the role the user picked.
    pub fn choose_role(&mut self, role: Role) {
        self.onboarded = true;
        self.chosen_role = role;
        self.mode = AuthMode::Login;
    }

    /// The auth screen's "I'm a patient / caretaker instead" link.
    pub fn switch_role(&mut self) {
        self.chosen_role = self.chosen_role.other();
        self.mode = AuthMode::Login;
    }

    /// Back to the role picker.
    pub fn restart_onboarding(&mut self) {
        self.onboarded = false;
        self.mode = AuthMode::Login;
    }

    /// Switch between login and signup. Patient accounts are created by
    /// their caretaker, so a patient cannot enter signup mode; returns
    /// whether the switch happened.
    pub fn set_mode(&mut self, mode: AuthMode) -> bool {
        if mode == AuthMode::Signup && self.chosen_role != Role::Caretaker {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn route(&self) -> Route {
        resolve(self)
    }
}

pub fn resolve(state: &RootState) -> Route {
    match state.session_role {
        Some(Role::Patient) => Route::PatientDashboard,
        Some(Role::Caretaker) => Route::CaretakerDashboard,
        None if !state.onboarded => Route::Onboarding,
        None => Route::Auth {
            role: state.chosen_role,
            mode: state.mode,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use medicare_types::models::User;
    use uuid::Uuid;

    fn session(role: Role) -> Session {
        Session {
            user: User {
                id: Uuid::new_v4(),
                email: "x@example.com".into(),
                username: "x".into(),
                role,
                caretaker_id: None,
                created_at: Utc::now(),
            },
            token: "t".into(),
            expires_at: Utc::now() + Duration::days(1),
        }
    }

    #[test]
    fn fresh_install_shows_onboarding() {
        assert_eq!(RootState::new().route(), Route::Onboarding);
    }

    #[test]
    fn session_wins_over_everything() {
        let mut state = RootState::new();
        state.observe_session(Some(&session(Role::Caretaker)));
        assert_eq!(state.route(), Route::CaretakerDashboard);

        // The dashboard follows the session's role, not the picked one.
        state.choose_role(Role::Caretaker);
        state.observe_session(Some(&session(Role::Patient)));
        assert_eq!(state.route(), Route::PatientDashboard);

        state.observe_session(None);
        assert_eq!(state.route(), Route::Onboarding);
    }

    #[test]
    fn no_session_yet_keeps_the_auth_screen() {
        let mut state = RootState::new();
        state.choose_role(Role::Caretaker);
        assert!(state.set_mode(AuthMode::Signup));

        // Startup reports "no session" before anyone signed in.
        state.observe_session(None);
        assert_eq!(
            state.route(),
            Route::Auth {
                role: Role::Caretaker,
                mode: AuthMode::Login
            }
        );
    }

    #[test]
    fn sign_out_returns_to_onboarding() {
        let mut state = RootState::new();
        state.choose_role(Role::Patient);
        state.observe_session(Some(&session(Role::Patient)));
        assert_eq!(state.route(), Route::PatientDashboard);

        state.observe_session(None);
        assert_eq!(state.route(), Route::Onboarding);

        state.choose_role(Role::Caretaker);
        assert_eq!(
            state.route(),
            Route::Auth {
                role: Role::Caretaker,
                mode: AuthMode::Login
            }
        );
    }

    #[test]
    fn switch_role_flips_the_auth_screen() {
        let mut state = RootState::new();
        state.choose_role(Role::Caretaker);
        assert!(state.set_mode(AuthMode::Signup));

        state.switch_role();
        assert_eq!(
            state.route(),
            Route::Auth {
                role: Role::Patient,
                mode: AuthMode::Login
            }
        );
        assert!(!state.set_mode(AuthMode::Signup));

        state.switch_role();
        assert_eq!(
            state.route(),
            Route::Auth {
                role: Role::Caretaker,
                mode: AuthMode::Login
            }
        );
    }

    #[test]
    fn only_caretakers_can_sign_up() {
        let mut state = RootState::new();
        state.choose_role(Role::Patient);
        assert!(!state.set_mode(AuthMode::Signup));
        assert_eq!(
            state.route(),
            Route::Auth {
                role: Role::Patient,
                mode: AuthMode::Login
            }
        );

        state.choose_role(Role::Caretaker);
        assert!(state.set_mode(AuthMode::Signup));
        assert_eq!(
            state.route(),
            Route::Auth {
                role: Role::Caretaker,
                mode: AuthMode::Signup
            }
        );

        state.restart_onboarding();
        assert_eq!(state.route(), Route::Onboarding);
    }
}
