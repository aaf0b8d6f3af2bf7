//! Note app actions shared by scenarios

use tracing::{debug, info};

use crate::error::E2eResult;
use crate::locator::Locator;
use crate::page::Page;

/// Locators for the note app's controls
pub mod ui {
    use crate::locator::Locator;

    pub const WRONG_CREDENTIALS: &str = "Wrong credentials";
    pub const MAKE_IMPORTANT: &str = "make important";
    pub const MAKE_NOT_IMPORTANT: &str = "make not important";
    pub const FOOTER: &str = "Note app, Department of Computer Science, University of Helsinki 2024";

    /// Both the button that opens the login form and the form's submit
    pub fn login_button() -> Locator {
        Locator::role_named("button", "login")
    }

    pub fn username_field() -> Locator {
        Locator::test_id("username")
    }

    pub fn password_field() -> Locator {
        Locator::test_id("password")
    }

    pub fn error_banner() -> Locator {
        Locator::css(".error")
    }

    /// Matches "<name> logged-in" for any user
    pub fn authenticated_banner() -> Locator {
        Locator::text("logged-in")
    }

    pub fn new_note_button() -> Locator {
        Locator::role_named("button", "new note")
    }

    pub fn note_input() -> Locator {
        Locator::role("textbox")
    }

    pub fn save_button() -> Locator {
        Locator::role_named("button", "save")
    }

    /// The element holding one note's text and its importance button
    pub fn note(text: &str) -> Locator {
        Locator::text(text).parent()
    }
}

/// Log in through the UI.
///
/// Returns once the page shows either the authenticated banner or the error
/// banner, whichever comes first. Fails with a timeout carrying the last page
/// text if neither appears. An error banner already showing before submit
/// only counts once it has disappeared or changed text; if it stays exactly
/// as it was for the whole wait, the new attempt is taken as rejected too.
pub async fn login(page: &mut Page, username: &str, password: &str) -> E2eResult<()> {
    debug!("Logging in as {}", username);

    let username_field = ui::username_field();
    if !page.state(&username_field).await?.visible {
        page.click(&ui::login_button()).await?;
    }

    page.fill(&username_field, username).await?;
    page.fill(&ui::password_field(), password).await?;

    let authenticated = ui::authenticated_banner();
    let error = ui::error_banner();
    let before = page.state(&error).await?;
    let stale_error = before.visible.then_some(before.text);

    page.click(&ui::login_button()).await?;

    let mut banner_changed = stale_error.is_none();
    let mut poller = page.wait_policy().poller();
    loop {
        if page.state(&authenticated).await?.visible {
            info!("{} logged in", username);
            return Ok(());
        }
        let banner = page.state(&error).await?;
        if !banner.visible {
            banner_changed = true;
        } else if banner_changed || stale_error.as_deref() != Some(banner.text.as_str()) {
            info!("Login as {} rejected", username);
            return Ok(());
        }
        if !poller.wait().await {
            if banner.visible {
                info!("Login as {} rejected, error banner unchanged", username);
                return Ok(());
            }
            let waiting_for = format!("login as {} to settle ({} or {})", username, authenticated, error);
            return Err(page.timeout(waiting_for, poller.elapsed_ms()).await);
        }
    }
}

/// Create a note through the UI and wait until it is listed.
///
/// With `mark_not_important`, the new note is then demoted with its own
/// "make not important" button and the call waits for its label to read
/// "make important". The page must already be logged in.
pub async fn create_note(page: &mut Page, text: &str, mark_not_important: bool) -> E2eResult<()> {
    debug!("Creating note {:?}", text);

    page.click(&ui::new_note_button()).await?;
    page.fill(&ui::note_input(), text).await?;
    page.click(&ui::save_button()).await?;
    page.wait_for(&Locator::text(text)).await?;

    if mark_not_important {
        let note = ui::note(text);
        page.click(&note.get_by_role("button", ui::MAKE_NOT_IMPORTANT))
            .await?;
        page.wait_for(&note.get_by_text(ui::MAKE_IMPORTANT)).await?;
    }

    Ok(())
}
