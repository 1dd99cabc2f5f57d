use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

/// Resolve the caller-held secret for `encrypt`, if any.
///
/// Returns `None` when the engine should generate a random secret instead.
pub fn read_secret(prompt: bool) -> Result<Option<Zeroizing<String>>> {
    //  Environment Variable
    //  CODEVAULT_SECRET="hunter2" codevault encrypt "some text"
    if let Ok(secret) = std::env::var("CODEVAULT_SECRET") {
        if !secret.is_empty() {
            return Ok(Some(Zeroizing::new(secret)));
        }
    }

    //  Interactive (TTY)
    if prompt {
        if !io::stdin().is_terminal() {
            bail!("--prompt-secret needs a terminal; set CODEVAULT_SECRET instead");
        }
        let secret = rpassword::prompt_password("Secret: ")?;
        if secret.is_empty() {
            bail!("secret cannot be empty");
        }
        return Ok(Some(Zeroizing::new(secret)));
    }

    Ok(None)
}
