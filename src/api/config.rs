use strum::{AsRefStr, Display, EnumString};

const DEFAULT_SUPABASE_URL: &str = "http://localhost:54321";

/// Identity providers the hosted auth service can redirect to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum AuthProvider {
    #[default]
    Google,
    Github,
    Gitlab,
    Azure,
    Discord,
}

impl AuthProvider {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Github => "GitHub",
            Self::Gitlab => "GitLab",
            Self::Azure => "Microsoft",
            Self::Discord => "Discord",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EnvConfig {
    pub supabase_url: String,
    pub anon_key: String,
    pub auth_provider: AuthProvider,
}

impl EnvConfig {
    /// Reads `window.ENV`, which the hosting page sets before the wasm module loads.
    pub fn new() -> Self {
        Self::from_lookup(read_window_env)
    }

    /// Upper-case keys win; lower-case ones are accepted as well.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .or_else(|| lookup(&key.to_ascii_lowercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let supabase_url = get("SUPABASE_URL")
            .unwrap_or_else(|| DEFAULT_SUPABASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let auth_provider = get("AUTH_PROVIDER")
            .and_then(|p| p.parse::<AuthProvider>().ok())
            .unwrap_or_default();

        Self {
            supabase_url,
            anon_key: get("SUPABASE_ANON_KEY").unwrap_or_default(),
            auth_provider,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_window_env(key: &str) -> Option<String> {
    let env = web_sys::window()?.get("ENV")?;
    if env.is_undefined() || !env.is_object() {
        return None;
    }
    js_sys::Reflect::get(&env, &key.into()).ok()?.as_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_env_config_defaults() {
        let cfg = EnvConfig::from_lookup(|_| None);
        assert_eq!(cfg.supabase_url, "http://localhost:54321");
        assert_eq!(cfg.anon_key, "");
        assert_eq!(cfg.auth_provider, AuthProvider::Google);
    }

    #[test]
    fn test_env_config_prefers_upper_case_keys() {
        let cfg = EnvConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://abc.supabase.co/"),
            ("supabase_url", "https://ignored.example"),
            ("supabase_anon_key", "anon"),
            ("AUTH_PROVIDER", "GitHub"),
        ]));
        assert_eq!(cfg.supabase_url, "https://abc.supabase.co");
        assert_eq!(cfg.anon_key, "anon");
        assert_eq!(cfg.auth_provider, AuthProvider::Github);
    }

    #[test]
    fn test_env_config_unknown_provider_falls_back() {
        let cfg = EnvConfig::from_lookup(lookup(&[("AUTH_PROVIDER", "myspace")]));
        assert_eq!(cfg.auth_provider, AuthProvider::Google);
    }

    #[test]
    fn test_auth_provider_wire_name() {
        assert_eq!(AuthProvider::Google.as_ref(), "google");
        assert_eq!(AuthProvider::Azure.to_string(), "azure");
        assert_eq!(AuthProvider::Azure.label(), "Microsoft");
    }
}
