//! In-memory note app for exercising the scenario layer without a browser
//!
//! The fake renders a small DOM from shared server state and resolves
//! locators with the same rules as the in-browser resolver: innermost
//! case-insensitive text, implicit roles, test ids, class selectors, parent
//! steps and "first visible match wins".

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;

use notes_e2e::actions::ui;
use notes_e2e::api::{RESET_PATH, USERS_PATH};
use notes_e2e::{Backend, BrowserLauncher, E2eError, E2eResult, ElementState, Locator, PageDriver, Selector, UserFixture};

/// Ways the fake app can misbehave
#[derive(Debug, Clone, Default)]
pub struct Quirks {
    /// Color of the error banner, red when unset
    pub error_color: Option<String>,
    /// Submitting the login form does nothing
    pub login_unresponsive: bool,
    pub reset_fails: bool,
    pub open_page_fails: bool,
    /// Saved notes show up after this many state probes
    pub save_delay_polls: usize,
    /// Toggling one note toggles all of them
    pub toggle_all: bool,
    /// Reset wipes users but leaves notes behind
    pub reset_keeps_notes: bool,
    /// After navigation the notes list renders after this many state probes
    pub list_loads_after_polls: usize,
    /// Login results show up after this many state probes
    pub login_delay_polls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNote {
    pub content: String,
    pub important: bool,
}

#[derive(Debug, Default)]
struct Shared {
    quirks: Quirks,
    users: Vec<UserFixture>,
    notes: Vec<StoredNote>,
    resets: usize,
    pages_opened: usize,
    pages_closed: usize,
    open_now: usize,
    max_open: usize,
    screenshots: usize,
    visited: Vec<String>,
}

/// Counters observed by tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub resets: usize,
    pub pages_opened: usize,
    pub pages_closed: usize,
    pub max_open: usize,
    pub screenshots: usize,
    pub visited: Vec<String>,
}

/// Server side of the fake; hands out pages and acts as the API
#[derive(Clone, Default)]
pub struct FakeApp {
    shared: Arc<Mutex<Shared>>,
}

impl FakeApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quirks(quirks: Quirks) -> Self {
        let app = Self::default();
        app.shared.lock().quirks = quirks;
        app
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(self.clone())
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::new(self.clone())
    }

    pub fn stats(&self) -> Stats {
        let shared = self.shared.lock();
        Stats {
            resets: shared.resets,
            pages_opened: shared.pages_opened,
            pages_closed: shared.pages_closed,
            max_open: shared.max_open,
            screenshots: shared.screenshots,
            visited: shared.visited.clone(),
        }
    }

    pub fn notes(&self) -> Vec<StoredNote> {
        self.shared.lock().notes.clone()
    }

    pub fn users(&self) -> Vec<UserFixture> {
        self.shared.lock().users.clone()
    }
}

#[async_trait]
impl Backend for FakeApp {
    async fn reset(&self) -> E2eResult<()> {
        let mut shared = self.shared.lock();
        if shared.quirks.reset_fails {
            return Err(E2eError::Api {
                endpoint: RESET_PATH.to_string(),
                status: 500,
                body: "database unavailable".to_string(),
            });
        }
        shared.users.clear();
        if !shared.quirks.reset_keeps_notes {
            shared.notes.clear();
        }
        shared.resets += 1;
        Ok(())
    }

    async fn create_user(&self, user: &UserFixture) -> E2eResult<()> {
        let mut shared = self.shared.lock();
        if shared.users.iter().any(|u| u.username == user.username) {
            return Err(E2eError::Api {
                endpoint: USERS_PATH.to_string(),
                status: 400,
                body: r#"{"error":"expected `username` to be unique"}"#.to_string(),
            });
        }
        shared.users.push(user.clone());
        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for FakeApp {
    async fn open_page(&self) -> E2eResult<Box<dyn PageDriver>> {
        let mut shared = self.shared.lock();
        if shared.quirks.open_page_fails {
            return Err(E2eError::Driver("browser crashed on launch".to_string()));
        }
        shared.pages_opened += 1;
        shared.open_now += 1;
        shared.max_open = shared.max_open.max(shared.open_now);
        Ok(Box::new(FakePage {
            shared: self.shared.clone(),
            ui: UiState::default(),
            pending: Vec::new(),
            pending_login: None,
        }))
    }
}

/// Client-side state of one page
#[derive(Debug, Default)]
struct UiState {
    loaded: bool,
    /// Display name of the logged-in user
    user: Option<String>,
    login_open: bool,
    note_form_open: bool,
    username: String,
    password: String,
    draft: String,
    error: Option<String>,
    /// Probes left before the notes list is rendered
    list_wait: usize,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    OpenLogin,
    CancelLogin,
    SubmitLogin,
    OpenNoteForm,
    SaveNote,
    Toggle(usize),
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Username,
    Password,
    Draft,
}

pub struct FakePage {
    shared: Arc<Mutex<Shared>>,
    ui: UiState,
    /// Saved notes waiting to appear: (probes left, note)
    pending: Vec<(usize, StoredNote)>,
    /// Submitted login waiting to settle: (probes left, display name on success)
    pending_login: Option<(usize, Option<String>)>,
}

impl FakePage {
    fn tick(&mut self, shared: &mut Shared) {
        let mut still_pending = Vec::new();
        for (left, note) in self.pending.drain(..) {
            if left == 0 {
                shared.notes.push(note);
            } else {
                still_pending.push((left - 1, note));
            }
        }
        self.pending = still_pending;

        self.ui.list_wait = self.ui.list_wait.saturating_sub(1);

        if let Some((left, outcome)) = self.pending_login.take() {
            if left == 0 {
                self.settle_login(outcome);
            } else {
                self.pending_login = Some((left - 1, outcome));
            }
        }
    }

    fn settle_login(&mut self, outcome: Option<String>) {
        match outcome {
            Some(name) => {
                self.ui.user = Some(name);
                self.ui.error = None;
                self.ui.login_open = false;
            }
            None => self.ui.error = Some(ui::WRONG_CREDENTIALS.to_string()),
        }
    }

    fn dom(&self, shared: &Shared) -> Dom {
        render(shared, &self.ui)
    }

    fn chosen(&self, shared: &Shared, locator: &Locator) -> (Dom, Option<usize>) {
        let dom = self.dom(shared);
        let matches = dom.resolve(locator);
        let chosen = dom.choose(&matches);
        (dom, chosen)
    }

    fn perform(&mut self, shared: &mut Shared, action: Action) {
        match action {
            Action::OpenLogin => self.ui.login_open = true,
            Action::CancelLogin => self.ui.login_open = false,
            Action::SubmitLogin => {
                if shared.quirks.login_unresponsive {
                    return;
                }
                let outcome = shared
                    .users
                    .iter()
                    .find(|u| u.username == self.ui.username && u.password == self.ui.password)
                    .map(|u| u.name.clone());
                self.ui.username.clear();
                self.ui.password.clear();
                match shared.quirks.login_delay_polls {
                    0 => self.settle_login(outcome),
                    delay => self.pending_login = Some((delay, outcome)),
                }
            }
            Action::OpenNoteForm => self.ui.note_form_open = true,
            Action::SaveNote => {
                let note = StoredNote {
                    content: std::mem::take(&mut self.ui.draft),
                    important: true,
                };
                self.ui.note_form_open = false;
                if shared.quirks.save_delay_polls == 0 {
                    shared.notes.push(note);
                } else {
                    self.pending.push((shared.quirks.save_delay_polls, note));
                }
            }
            Action::Toggle(index) => {
                if shared.quirks.toggle_all {
                    for note in shared.notes.iter_mut() {
                        note.important = !note.important;
                    }
                } else if let Some(note) = shared.notes.get_mut(index) {
                    note.important = !note.important;
                }
            }
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        let list_wait = {
            let mut shared = self.shared.lock();
            shared.visited.push(url.to_string());
            shared.quirks.list_loads_after_polls
        };
        // the session survives a reload, open forms and banners do not
        self.ui = UiState {
            loaded: true,
            user: self.ui.user.take(),
            list_wait,
            ..UiState::default()
        };
        self.pending_login = None;
        Ok(())
    }

    async fn state(&mut self, locator: &Locator) -> E2eResult<ElementState> {
        let shared = self.shared.clone();
        let mut shared = shared.lock();
        self.tick(&mut shared);

        let dom = self.dom(&shared);
        let matches = dom.resolve(locator);
        Ok(match dom.choose(&matches) {
            Some(id) => ElementState {
                count: matches.len(),
                visible: dom.is_visible(id),
                text: dom.text(id),
            },
            None => ElementState::default(),
        })
    }

    async fn computed_style(&mut self, locator: &Locator, property: &str) -> E2eResult<Option<String>> {
        let shared = self.shared.lock();
        let (dom, chosen) = self.chosen(&shared, locator);
        Ok(chosen.map(|id| dom.style(id, property)))
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let shared = self.shared.clone();
        let mut shared = shared.lock();
        let (dom, chosen) = self.chosen(&shared, locator);
        let id = match chosen {
            Some(id) if dom.is_visible(id) => id,
            _ => return Err(E2eError::Driver(format!("{} is not clickable", locator))),
        };
        if let Some(action) = dom.nodes[id].action {
            self.perform(&mut shared, action);
        }
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let shared = self.shared.lock();
        let (dom, chosen) = self.chosen(&shared, locator);
        let field = chosen
            .filter(|id| dom.is_visible(*id))
            .and_then(|id| dom.nodes[id].field)
            .ok_or_else(|| E2eError::Driver(format!("{} is not an editable input", locator)))?;
        drop(shared);

        let value = value.to_string();
        match field {
            Field::Username => self.ui.username = value,
            Field::Password => self.ui.password = value,
            Field::Draft => self.ui.draft = value,
        }
        Ok(())
    }

    async fn page_text(&mut self) -> E2eResult<String> {
        let shared = self.shared.lock();
        let dom = self.dom(&shared);
        Ok(dom.visible_text(0))
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        std::fs::write(path, b"\x89PNG fake")?;
        self.shared.lock().screenshots += 1;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        let mut shared = self.shared.lock();
        shared.pages_closed += 1;
        shared.open_now = shared.open_now.saturating_sub(1);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Node {
    tag: &'static str,
    parent: Option<usize>,
    children: Vec<usize>,
    text: String,
    class: Option<&'static str>,
    test_id: Option<&'static str>,
    input_type: Option<&'static str>,
    placeholder: Option<&'static str>,
    hidden: bool,
    styles: Vec<(&'static str, String)>,
    action: Option<Action>,
    field: Option<Field>,
}

impl Node {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn class(mut self, class: &'static str) -> Self {
        self.class = Some(class);
        self
    }

    fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    fn on_click(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    fn input(mut self, input_type: &'static str, field: Field) -> Self {
        self.input_type = Some(input_type);
        self.field = Some(field);
        self
    }
}

/// Arena DOM; node ids follow document order
struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    fn new() -> Self {
        Self {
            nodes: vec![Node::new("html")],
        }
    }

    fn add(&mut self, parent: usize, mut node: Node) -> usize {
        let id = self.nodes.len();
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    fn descendants(&self, scope: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for &child in &self.nodes[scope].children {
            out.push(child);
            out.extend(self.descendants(child));
        }
        out
    }

    fn contains(&self, ancestor: usize, node: usize) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    fn text(&self, id: usize) -> String {
        let node = &self.nodes[id];
        let mut parts = vec![node.text.clone()];
        parts.extend(node.children.iter().map(|c| self.text(*c)));
        normalize(&parts.join(" "))
    }

    fn visible_text(&self, id: usize) -> String {
        let node = &self.nodes[id];
        if node.hidden {
            return String::new();
        }
        let mut parts = vec![node.text.clone()];
        parts.extend(node.children.iter().map(|c| self.visible_text(*c)));
        normalize(&parts.join(" "))
    }

    fn is_visible(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            if self.nodes[id].hidden {
                return false;
            }
            current = self.nodes[id].parent;
        }
        true
    }

    fn role(&self, id: usize) -> Option<&'static str> {
        let node = &self.nodes[id];
        match (node.tag, node.input_type) {
            ("button", _) => Some("button"),
            ("h1", _) => Some("heading"),
            ("input", Some("text")) => Some("textbox"),
            _ => None,
        }
    }

    fn accessible_name(&self, id: usize) -> String {
        let node = &self.nodes[id];
        if node.tag == "input" {
            return node.placeholder.unwrap_or_default().to_string();
        }
        self.text(id)
    }

    fn style(&self, id: usize, property: &str) -> String {
        let node = &self.nodes[id];
        if let Some((_, value)) = node.styles.iter().find(|(p, _)| *p == property) {
            return value.clone();
        }
        match property {
            "color" => "rgb(0, 0, 0)".to_string(),
            "border-style" => "none".to_string(),
            _ => String::new(),
        }
    }

    fn resolve(&self, locator: &Locator) -> Vec<usize> {
        let mut matches = vec![0];
        for step in locator.steps() {
            let mut out: Vec<usize> = Vec::new();
            for &scope in &matches {
                let found: Vec<usize> = match step {
                    Selector::Text { text } => {
                        let want = text.to_lowercase();
                        let hits: Vec<usize> = self
                            .descendants(scope)
                            .into_iter()
                            .filter(|id| self.text(*id).to_lowercase().contains(&want))
                            .collect();
                        hits.iter()
                            .copied()
                            .filter(|id| !hits.iter().any(|other| self.contains(*id, *other)))
                            .collect()
                    }
                    Selector::Role { role, name } => self
                        .descendants(scope)
                        .into_iter()
                        .filter(|id| self.role(*id) == Some(role.as_str()))
                        .filter(|id| match name {
                            Some(name) => self
                                .accessible_name(*id)
                                .to_lowercase()
                                .contains(&name.to_lowercase()),
                            None => true,
                        })
                        .collect(),
                    Selector::TestId { id } => self
                        .descendants(scope)
                        .into_iter()
                        .filter(|n| self.nodes[*n].test_id == Some(id.as_str()))
                        .collect(),
                    Selector::Css { selector } => {
                        let (class, tag) = match selector.strip_prefix('.') {
                            Some(class) => (Some(class), None),
                            None => (None, Some(selector.as_str())),
                        };
                        self.descendants(scope)
                            .into_iter()
                            .filter(|n| {
                                let node = &self.nodes[*n];
                                class.map_or(true, |c| node.class == Some(c))
                                    && tag.map_or(true, |t| node.tag == t)
                            })
                            .collect()
                    }
                    Selector::Parent => self.nodes[scope].parent.into_iter().collect(),
                };
                for id in found {
                    if !out.contains(&id) {
                        out.push(id);
                    }
                }
            }
            matches = out;
        }
        matches
    }

    fn choose(&self, matches: &[usize]) -> Option<usize> {
        matches
            .iter()
            .copied()
            .find(|id| self.is_visible(*id))
            .or_else(|| matches.first().copied())
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render(shared: &Shared, state: &UiState) -> Dom {
    let mut dom = Dom::new();
    let body = dom.add(0, Node::new("body"));
    if !state.loaded {
        return dom;
    }
    let root = dom.add(body, Node::new("div"));

    dom.add(root, Node::new("h1").text("Notes"));

    if let Some(message) = &state.error {
        let color = shared
            .quirks
            .error_color
            .clone()
            .unwrap_or_else(|| "rgb(255, 0, 0)".to_string());
        let mut banner = Node::new("div").class("error").text(message.clone());
        banner.styles = vec![("border-style", "solid".to_string()), ("color", color)];
        dom.add(root, banner);
    }

    match &state.user {
        None => {
            let toggle = dom.add(root, Node::new("div").hidden(state.login_open));
            dom.add(toggle, Node::new("button").text("login").on_click(Action::OpenLogin));

            let form = dom.add(root, Node::new("form").hidden(!state.login_open));
            let row = dom.add(form, Node::new("div").text("username"));
            let mut username = Node::new("input").input("text", Field::Username);
            username.test_id = Some("username");
            dom.add(row, username);
            let row = dom.add(form, Node::new("div").text("password"));
            let mut password = Node::new("input").input("password", Field::Password);
            password.test_id = Some("password");
            dom.add(row, password);
            dom.add(form, Node::new("button").text("login").on_click(Action::SubmitLogin));
            dom.add(form, Node::new("button").text("cancel").on_click(Action::CancelLogin));
        }
        Some(name) => {
            dom.add(root, Node::new("p").text(format!("{} logged-in", name)));

            let toggle = dom.add(root, Node::new("div").hidden(state.note_form_open));
            dom.add(toggle, Node::new("button").text("new note").on_click(Action::OpenNoteForm));

            let form = dom.add(root, Node::new("form").hidden(!state.note_form_open));
            let mut input = Node::new("input").input("text", Field::Draft);
            input.placeholder = Some("write note content here");
            dom.add(form, input);
            dom.add(form, Node::new("button").text("save").on_click(Action::SaveNote));
        }
    }

    let list = dom.add(root, Node::new("ul"));
    let loaded_notes = if state.list_wait == 0 { shared.notes.as_slice() } else { &[] };
    for (index, note) in loaded_notes.iter().enumerate() {
        let item = dom.add(list, Node::new("li").class("note"));
        dom.add(item, Node::new("span").text(note.content.clone()));
        let label = if note.important {
            ui::MAKE_NOT_IMPORTANT
        } else {
            ui::MAKE_IMPORTANT
        };
        dom.add(item, Node::new("button").text(label).on_click(Action::Toggle(index)));
    }

    let footer = dom.add(root, Node::new("div"));
    dom.add(footer, Node::new("em").text(ui::FOOTER));

    dom
}
