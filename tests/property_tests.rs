use std::sync::Arc;

use pkcs11_session::core::mock::{CallKind, MockModule};
use pkcs11_session::{Error, Handle, OpenMode, Slot, TokenInfo, UserType};

use proptest::prelude::*;

const USER_PIN: &str = "1234";
const SO_PIN: &str = "87654321";

#[derive(Debug, Clone)]
enum Op {
    Login { user_type: UserType, correct_pin: bool },
    Logout,
    Destroy,
}

// Strategy for generating user types
fn user_types() -> impl Strategy<Value = UserType> {
    prop_oneof![Just(UserType::User), Just(UserType::So)]
}

// Strategy for generating session operations; destroy is kept rare
fn ops() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (user_types(), any::<bool>())
            .prop_map(|(user_type, correct_pin)| Op::Login { user_type, correct_pin }),
        3 => Just(Op::Logout),
        1 => Just(Op::Destroy),
    ]
}

fn open_modes() -> impl Strategy<Value = OpenMode> {
    prop_oneof![Just(OpenMode::ReadOnly), Just(OpenMode::ReadWrite)]
}

// Expected session state
#[derive(Debug, Default)]
struct Model {
    user: bool,
    so: bool,
    destroyed: bool,
    native_logins: usize,
    native_logouts: usize,
}

impl Model {
    fn logged_in(&self, user_type: UserType) -> bool {
        match user_type {
            UserType::User => self.user,
            UserType::So => self.so,
        }
    }
}

fn pin_for(user_type: UserType, correct: bool) -> &'static str {
    match (user_type, correct) {
        (UserType::User, true) => USER_PIN,
        (UserType::So, true) => SO_PIN,
        (_, false) => "wrong",
    }
}

proptest! {
    #[test]
    fn test_session_follows_login_model(mode in open_modes(), ops in prop::collection::vec(ops(), 1..40)) {
        let module = Arc::new(MockModule::new(USER_PIN, SO_PIN));
        let slot = Slot::new(module.clone(), Handle::new(1), Handle::new(2), TokenInfo::default());
        let session = slot.open_session(mode).unwrap();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Login { user_type, correct_pin } => {
                    let pin = pin_for(user_type, correct_pin);
                    let result = match user_type {
                        UserType::User => session.login_user(Some(pin)),
                        UserType::So => session.login_so(Some(pin)),
                    };
                    if model.destroyed {
                        prop_assert_eq!(result, Err(Error::Destroyed("Session")));
                    } else if model.logged_in(user_type) {
                        prop_assert_eq!(result, Err(Error::AlreadyLoggedIn(user_type)));
                    } else {
                        model.native_logins += 1;
                        if correct_pin {
                            prop_assert!(result.is_ok());
                            match user_type {
                                UserType::User => model.user = true,
                                UserType::So => model.so = true,
                            }
                        } else {
                            prop_assert!(matches!(result, Err(Error::Provider(_))));
                        }
                    }
                }
                Op::Logout => {
                    let result = session.logout();
                    if model.destroyed {
                        prop_assert_eq!(result, Err(Error::Destroyed("Session")));
                    } else {
                        prop_assert!(result.is_ok());
                        if model.user || model.so {
                            model.native_logouts += 1;
                        }
                        model.user = false;
                        model.so = false;
                    }
                }
                Op::Destroy => {
                    prop_assert!(session.destroy().is_ok());
                    model.destroyed = true;
                    model.user = false;
                    model.so = false;
                }
            }

            prop_assert_eq!(session.is_user_logged_in(), model.user);
            prop_assert_eq!(session.is_so_logged_in(), model.so);
            prop_assert_eq!(session.is_destroyed(), model.destroyed);
        }

        prop_assert_eq!(module.call_count(CallKind::Open), 1);
        prop_assert_eq!(module.call_count(CallKind::Login), model.native_logins);
        prop_assert_eq!(module.call_count(CallKind::Logout), model.native_logouts);
        prop_assert_eq!(module.call_count(CallKind::Close), usize::from(model.destroyed));
    }

    #[test]
    fn test_slot_destroys_every_session(count in 1..8usize, destroyed_first in 0..8usize) {
        let module = Arc::new(MockModule::default());
        let slot = Slot::new(module.clone(), Handle::new(1), Handle::new(2), TokenInfo::default());
        let sessions: Vec<_> = (0..count)
            .map(|_| slot.open_session(OpenMode::ReadWrite).unwrap())
            .collect();

        let early = destroyed_first.min(count);
        for session in &sessions[..early] {
            session.destroy().unwrap();
        }
        prop_assert_eq!(slot.open_session_count(), count - early);

        drop(slot);
        prop_assert!(sessions.iter().all(|s| s.is_destroyed()));
        prop_assert_eq!(module.call_count(CallKind::Close), count);
        prop_assert_eq!(module.open_session_count(), 0);
    }
}
