//! The note app scenarios

use std::time::Duration;
use futures::FutureExt;

use crate::actions::{create_note, login, ui};
use crate::api::UserFixture;
use crate::error::E2eResult;
use crate::expect::expect;
use crate::locator::Locator;
use crate::scenario::{Group, ScenarioContext};

/// How long "never appears" checks keep watching
pub const SETTLE_WINDOW: Duration = Duration::from_millis(500);

pub const SEEDED_NOTES: [&str; 3] = ["first note", "second note", "third note"];

/// The user every scenario starts with
pub fn florencia() -> UserFixture {
    UserFixture::new("Florencia Martinez", "florm92", "contraseña1234")
}

pub fn note_app() -> Group {
    Group::new("Note app")
        .before_each(|ctx| reset_and_open(ctx).boxed())
        .scenario("front page can be opened", |ctx| front_page(ctx).boxed())
        .scenario("login fails with wrong password", |ctx| wrong_password(ctx).boxed())
        .scenario("user can log in", |ctx| correct_password(ctx).boxed())
        .scenario("reset removes previously created users", |ctx| reset_removes_users(ctx).boxed())
        .group(
            Group::new("when logged in")
                .before_each(|ctx| login_as_florencia(ctx).boxed())
                .scenario("a new note can be created", |ctx| new_note(ctx).boxed())
                .scenario("a note can be created as not important", |ctx| {
                    new_unimportant_note(ctx).boxed()
                })
                .scenario("reset removes previously created notes", |ctx| {
                    reset_removes_notes(ctx).boxed()
                })
                .group(
                    Group::new("and a note exist")
                        .before_each(|ctx| seed_notes(ctx).boxed())
                        .scenario("one of those can be made nonimportant", |ctx| {
                            toggle_only_one(ctx, "first note").boxed()
                        })
                        .scenario("importance can be changed", |ctx| {
                            toggle_only_one(ctx, "second note").boxed()
                        })
                        .scenario("every created note is listed", |ctx| all_notes_listed(ctx).boxed()),
                ),
        )
}

async fn reset_and_open(ctx: &mut ScenarioContext) -> E2eResult<()> {
    ctx.backend.reset().await?;
    ctx.backend.create_user(&florencia()).await?;
    ctx.page.goto("/").await
}

async fn login_as_florencia(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let user = florencia();
    login(&mut ctx.page, &user.username, &user.password).await
}

async fn seed_notes(ctx: &mut ScenarioContext) -> E2eResult<()> {
    for text in SEEDED_NOTES {
        create_note(&mut ctx.page, text, false).await?;
    }
    Ok(())
}

async fn front_page(ctx: &mut ScenarioContext) -> E2eResult<()> {
    expect(&mut ctx.page, &Locator::text("Notes")).to_be_visible().await?;
    expect(&mut ctx.page, &Locator::text(ui::FOOTER))
        .to_be_visible()
        .await
}

async fn wrong_password(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let user = florencia();
    login(&mut ctx.page, &user.username, "wrongpassword").await?;

    let error = ui::error_banner();
    expect(&mut ctx.page, &error)
        .to_contain_text(ui::WRONG_CREDENTIALS)
        .await?;
    expect(&mut ctx.page, &error)
        .to_have_css("border-style", "solid")
        .await?;
    expect(&mut ctx.page, &error)
        .to_have_css("color", "rgb(255, 0, 0)")
        .await?;

    expect(&mut ctx.page, &Locator::text(user.logged_in_banner()))
        .within(SETTLE_WINDOW)
        .to_stay_hidden()
        .await
}

async fn correct_password(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let user = florencia();
    login(&mut ctx.page, &user.username, &user.password).await?;
    expect(&mut ctx.page, &Locator::text(user.logged_in_banner()))
        .to_be_visible()
        .await?;
    expect(&mut ctx.page, &ui::error_banner())
        .within(SETTLE_WINDOW)
        .to_stay_hidden()
        .await
}

async fn reset_removes_users(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let user = florencia();
    ctx.backend.reset().await?;
    ctx.page.goto("/").await?;

    login(&mut ctx.page, &user.username, &user.password).await?;
    expect(&mut ctx.page, &ui::error_banner())
        .to_contain_text(ui::WRONG_CREDENTIALS)
        .await?;
    expect(&mut ctx.page, &Locator::text(user.logged_in_banner()))
        .not()
        .to_be_visible()
        .await
}

async fn new_note(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let text = "a note created by playwright";
    create_note(&mut ctx.page, text, false).await?;
    expect(&mut ctx.page, &Locator::text(text)).to_be_visible().await
}

async fn new_unimportant_note(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let text = "a note that is not important";
    create_note(&mut ctx.page, text, true).await?;
    expect(&mut ctx.page, &ui::note(text).get_by_role("button", ui::MAKE_IMPORTANT))
        .to_be_visible()
        .await
}

async fn reset_removes_notes(ctx: &mut ScenarioContext) -> E2eResult<()> {
    let text = "a note that will be wiped";
    create_note(&mut ctx.page, text, false).await?;

    ctx.backend.reset().await?;
    ctx.page.goto("/").await?;
    ctx.page.wait_for(&ui::new_note_button()).await?;

    // the list is fetched after load, so absence has to hold for a while
    expect(&mut ctx.page, &Locator::text(text))
        .within(SETTLE_WINDOW)
        .to_stay_hidden()
        .await
}

/// Toggle `target` and check the other seeded notes keep their label
async fn toggle_only_one(ctx: &mut ScenarioContext, target: &'static str) -> E2eResult<()> {
    let note = ui::note(target);
    ctx.page
        .click(&note.get_by_role("button", ui::MAKE_NOT_IMPORTANT))
        .await?;
    expect(&mut ctx.page, &note.get_by_text(ui::MAKE_IMPORTANT))
        .to_be_visible()
        .await?;

    for other in SEEDED_NOTES.iter().filter(|t| **t != target) {
        let sibling = ui::note(other);
        expect(&mut ctx.page, &sibling.get_by_text(ui::MAKE_NOT_IMPORTANT))
            .to_be_visible()
            .await?;
        expect(&mut ctx.page, &sibling.get_by_text(ui::MAKE_IMPORTANT))
            .not()
            .to_be_visible()
            .await?;
    }
    Ok(())
}

async fn all_notes_listed(ctx: &mut ScenarioContext) -> E2eResult<()> {
    for text in SEEDED_NOTES {
        expect(&mut ctx.page, &Locator::text(text)).to_be_visible().await?;
    }
    Ok(())
}
