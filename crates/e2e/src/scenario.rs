//! Scenario groups and their setup chain
//!
//! ```ignore
//! Group::new("Note app")
//!     .before_each(|ctx| async move { ctx.backend.reset().await }.boxed())
//!     .scenario("front page can be opened", |ctx| {
//!         async move { expect(&mut ctx.page, &Locator::text("Notes")).to_be_visible().await }.boxed()
//!     })
//!     .group(Group::new("when logged in").before_each(...))
//! ```
//!
//! [`Group::plan`] flattens the tree into [`PlannedScenario`]s, each carrying
//! the hooks of every enclosing group in outer-to-inner declaration order.

use std::sync::Arc;
use futures::future::BoxFuture;

use crate::api::Backend;
use crate::error::E2eResult;
use crate::page::Page;

/// Separator between group and scenario names in full names
pub const NAME_SEPARATOR: &str = " › ";

pub type StepFuture<'a> = BoxFuture<'a, E2eResult<()>>;

/// A hook or scenario body
pub type Step = Arc<dyn for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync>;

/// Everything one scenario owns while it runs
pub struct ScenarioContext {
    /// Full scenario name
    pub name: String,
    pub page: Page,
    pub backend: Arc<dyn Backend>,
}

#[derive(Clone)]
pub struct Scenario {
    name: String,
    body: Step,
    focused: bool,
    skipped: bool,
}

impl Scenario {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone)]
enum Item {
    Scenario(Scenario),
    Group(Group),
}

#[derive(Clone)]
struct Hook {
    label: String,
    step: Step,
}

/// Named collection of scenarios and nested groups sharing setup
#[derive(Clone)]
pub struct Group {
    name: String,
    hooks: Vec<Hook>,
    items: Vec<Item>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Setup run before every scenario of this group and its subgroups
    pub fn before_each<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        let label = format!("{} before_each #{}", self.name, self.hooks.len() + 1);
        self.hooks.push(Hook {
            label,
            step: Arc::new(hook),
        });
        self
    }

    pub fn scenario<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.push_scenario(name.into(), Arc::new(body), false, false)
    }

    /// Like [`Group::scenario`], but when any scenario in the run is focused
    /// only focused ones execute (`test.only`)
    pub fn only<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.push_scenario(name.into(), Arc::new(body), true, false)
    }

    /// Declared but not run; reported as skipped
    pub fn skip<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.push_scenario(name.into(), Arc::new(body), false, true)
    }

    pub fn group(mut self, group: Group) -> Self {
        self.items.push(Item::Group(group));
        self
    }

    fn push_scenario(mut self, name: String, body: Step, focused: bool, skipped: bool) -> Self {
        self.items.push(Item::Scenario(Scenario {
            name,
            body,
            focused,
            skipped,
        }));
        self
    }

    /// Flatten into runnable scenarios in declaration order
    pub fn plan(&self) -> Vec<PlannedScenario> {
        let mut planned = Vec::new();
        self.plan_into(&[], &[], &mut planned);
        planned
    }

    fn plan_into(&self, path: &[String], inherited: &[Hook], out: &mut Vec<PlannedScenario>) {
        let mut path = path.to_vec();
        path.push(self.name.clone());

        let mut hooks = inherited.to_vec();
        hooks.extend(self.hooks.iter().cloned());

        for item in &self.items {
            match item {
                Item::Scenario(scenario) => {
                    let mut full = path.clone();
                    full.push(scenario.name.clone());
                    out.push(PlannedScenario {
                        name: full.join(NAME_SEPARATOR),
                        hooks: hooks.iter().map(|h| (h.label.clone(), h.step.clone())).collect(),
                        body: scenario.body.clone(),
                        focused: scenario.focused,
                        skipped: scenario.skipped,
                    });
                }
                Item::Group(group) => group.plan_into(&path, &hooks, out),
            }
        }
    }
}

/// A scenario with its full setup chain resolved
#[derive(Clone)]
pub struct PlannedScenario {
    pub name: String,
    /// `(label, hook)` pairs, outermost group first
    pub hooks: Vec<(String, Step)>,
    pub body: Step,
    pub focused: bool,
    pub skipped: bool,
}

impl std::fmt::Debug for PlannedScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedScenario")
            .field("name", &self.name)
            .field("hooks", &self.hooks.iter().map(|(l, _)| l).collect::<Vec<_>>())
            .field("focused", &self.focused)
            .field("skipped", &self.skipped)
            .finish()
    }
}
