use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use tessera::prelude::*;
use tracing::info;

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

struct Banner;

impl AuthListener for Banner {
    fn logged_in(&self, user: &User) {
        info!(user_id = %user.id(), anonymous = user.is_anonymous(), "welcome");
    }

    fn logged_out(&self, user: &User) {
        info!(user_id = %user.id(), state = %user.state(), "goodbye");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Starts anonymous, upgrades to email/password in the background, then
/// logs out and back in with the upgraded account.
fn main() -> Result<(), TesseraError> {
    tessera::init_tracing();

    let mut event_loop = EventLoop::new()?;
    let app = App::builder("anonymous-upgrade-demo")
        .worker_threads(2)
        .gateway(Arc::new(InMemoryBackend::new()))
        .listener(Arc::new(Banner))
        .build()?;

    let guest = app.log_in(&Credentials::anonymous())?;
    info!(user_id = %guest.id(), "browsing as a guest");

    let (tx, rx) = mpsc::channel();
    guest.link_user_async(
        Credentials::email_password("guest@example.com", "correct horse"),
        move |result| {
            let _ = tx.send(result);
        },
    )?;

    let mut upgraded = None;
    event_loop.run_until(Duration::from_secs(5), || {
        if let Ok(result) = rx.try_recv() {
            upgraded = Some(result);
        }
        upgraded.is_some()
    });
    let Some(result) = upgraded else {
        eprintln!("timed out waiting for the upgrade");
        return Ok(());
    };
    let user = result?;

    let providers: Vec<&str> = user
        .identities()
        .iter()
        .map(|identity| identity.provider.as_str())
        .collect();
    info!(user_id = %user.id(), ?providers, "account upgraded");

    user.log_out()?;
    let back = app.log_in(&Credentials::email_password("guest@example.com", "correct horse"))?;
    info!(same_user = back == user, state = %back.state(), "signed back in");

    app.shutdown(Duration::from_secs(1));
    Ok(())
}
