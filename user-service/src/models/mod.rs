//! Persistence models

mod user;

pub use user::{
    user_name_candidate, NewUser, Role, User, UserField, UserNumeric, UserRecord, UserView,
    ADMIN_ROLES, USER_ROLES,
};
