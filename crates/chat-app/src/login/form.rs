#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    #[default]
    SignIn,
    SignUp,
}

impl LoginMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::SignIn => Self::SignUp,
            Self::SignUp => Self::SignIn,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::SignIn => "Welcome Back",
            Self::SignUp => "Create Account",
        }
    }

    pub fn submit_label(self) -> &'static str {
        match self {
            Self::SignIn => "Sign In",
            Self::SignUp => "Sign Up",
        }
    }

    pub fn switch_prompt(self) -> &'static str {
        match self {
            Self::SignIn => "Don't have an account?",
            Self::SignUp => "Already have an account?",
        }
    }

    /// Label of the link that flips to the other mode.
    pub fn switch_label(self) -> &'static str {
        self.toggled().submit_label()
    }
}

/// Credentials captured for one identity call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub mode: LoginMode,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    email: String,
    password: String,
    mode: LoginMode,
    submitting: bool,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn mode(&self) -> LoginMode {
        self.mode
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Flips sign-in and sign-up. Entered credentials are kept.
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting && !self.email.trim().is_empty() && !self.password.is_empty()
    }

    /// Returns the credentials to send, or `None` when a field is missing or
    /// a call is already running.
    pub fn begin_submit(&mut self) -> Option<Credentials> {
        if !self.can_submit() {
            return None;
        }

        self.submitting = true;
        Some(Credentials {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            mode: self.mode,
        })
    }

    /// Marks a provider sign-in as running; refused while another call runs.
    pub fn begin_provider_sign_in(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    pub fn finish_submit(&mut self) {
        self.submitting = false;
    }
}
