pub mod form;
pub mod view;

pub use form::{LoginForm, LoginMode};
pub use view::LoginView;
