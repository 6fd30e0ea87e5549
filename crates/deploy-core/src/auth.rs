//! Sign-in state.
//!
//! Free-text input only reaches the model once the user has signed in with
//! `/login`, which succeeds when the provider holds an API key.

use deploy_provider::groq::GROQ_API_KEY_ENV;
use deploy_provider::LanguageModel;
use tracing::info;

pub const LOGIN_SUCCESS: &str =
    "Successfully authenticated. Reasoning model (GPT-OSS) is now active.";

pub const LOGIN_REQUIRED: &str = "⚠️  Please login to continue. Type /login";

pub const LOGOUT_SUCCESS: &str = "Logged out. Type /login to sign in again.";

/// Reply when `/login` finds no credentials.
pub fn missing_credentials() -> String {
    format!(
        "No API key found. Set {} or provider.api_key in deploy.json, then run /login again.",
        GROQ_API_KEY_ENV
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Auth {
    authenticated: bool,
}

impl Auth {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Sign in if the provider can make requests.
    pub fn login(&mut self, provider: &dyn LanguageModel) -> bool {
        self.authenticated = provider.has_credentials();
        info!(
            provider = provider.provider_id(),
            authenticated = self.authenticated,
            "Login attempted"
        );
        self.authenticated
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_provider::mock::MockProvider;
    use deploy_provider::ModelInfo;

    #[test]
    fn test_login_requires_credentials() {
        let mut auth = Auth::default();
        assert!(!auth.is_authenticated());

        let without = MockProvider::without_credentials(ModelInfo::new("m", "mock"));
        assert!(!auth.login(&without));

        let with = MockProvider::new(ModelInfo::new("m", "mock"));
        assert!(auth.login(&with));
        assert!(auth.is_authenticated());

        auth.logout();
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_missing_credentials_names_variable() {
        assert!(missing_credentials().contains("GROQ_API_KEY"));
    }
}
