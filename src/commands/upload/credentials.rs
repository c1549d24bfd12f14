use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

pub const URL_VAR: &str = "NEXT_PUBLIC_SUPABASE_URL";
pub const SERVICE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ANON_KEY_VAR: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";

const ENV_FILES: [&str; 2] = [".env.local", ".env"];

#[derive(Clone)]
pub struct Credentials {
    pub url: String,
    pub key: String,
    pub key_var: &'static str,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("key_var", &self.key_var)
            .finish()
    }
}

/// Variables from `.env.local` then `.env`; an earlier file wins.
#[derive(Debug, Default)]
pub struct EnvFiles {
    values: HashMap<String, String>,
}

impl EnvFiles {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut values = HashMap::new();

        for name in ENV_FILES {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }

            let entries = dotenvy::from_path_iter(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            for entry in entries {
                let (key, value) =
                    entry.with_context(|| format!("failed to parse {}", path.display()))?;
                values.entry(key).or_insert(value);
            }
            debug!(path = %path.display(), "loaded env file");
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

pub fn resolve<F>(lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let url = present(URL_VAR);
    let key = present(SERVICE_KEY_VAR)
        .map(|value| (value, SERVICE_KEY_VAR))
        .or_else(|| present(ANON_KEY_VAR).map(|value| (value, ANON_KEY_VAR)));

    match (url, key) {
        (Some(url), Some((key, key_var))) => Ok(Credentials { url, key, key_var }),
        _ => bail!(
            "hosted store credentials not found; set {URL_VAR} and {SERVICE_KEY_VAR} (or {ANON_KEY_VAR}) in the environment, .env.local, or .env"
        ),
    }
}
