//! TodoMVC component.
//!
//! Every action rewrites the whole `.todoapp` section. The client keeps the
//! active filter in its state (`{"Page": "active"}`), which the pages set
//! and the actions read back to render the same view.

use std::sync::Arc;

use maud::{Markup, html};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::layout::{TODOMVC_CSS, document, nav_links, script_var};
use crate::domain::{ComponentScope, RegistryBuilder, Update};
use crate::service::{ActionContext, ActionError, Page, PageError, page_fn, typed_action};

/// One todo entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Stable identifier.
    pub id: u64,
    /// Trimmed text.
    pub text: String,
    /// Completion flag.
    pub done: bool,
}

/// Which items a view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    /// Every item.
    #[default]
    All,
    /// Items not yet done.
    Active,
    /// Done items.
    Completed,
}

impl Filter {
    /// Parses the page name kept in client state; unknown names show all.
    #[must_use]
    pub fn from_page(page: &str) -> Self {
        match page {
            "active" => Self::Active,
            "completed" => Self::Completed,
            _ => Self::All,
        }
    }

    /// Page name kept in client state.
    #[must_use]
    pub const fn page(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Page path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::All => "/",
            Self::Active => "/active",
            Self::Completed => "/completed",
        }
    }

    fn keeps(self, item: &TodoItem) -> bool {
        match self {
            Self::All => true,
            Self::Active => !item.done,
            Self::Completed => item.done,
        }
    }
}

/// Client state of the todo pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoState {
    /// Active filter name.
    #[serde(rename = "Page", alias = "page", default)]
    pub page: String,
}

#[derive(Debug, Default, Deserialize)]
struct NewTodoArgs {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct IdArgs {
    #[serde(default)]
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateItemArgs {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct NoArgs {}

/// In-memory todo list shared by all clients.
#[derive(Debug, Default)]
pub struct TodoList {
    items: RwLock<Vec<TodoItem>>,
}

/// Item currently in edit mode, if any.
type Editing = Option<u64>;

impl TodoList {
    /// Returns a copy of all items.
    pub async fn items(&self) -> Vec<TodoItem> {
        self.items.read().await.clone()
    }

    /// Registers the `TodoList.*` actions and the three filter pages.
    pub fn register(self: &Arc<Self>, builder: &mut RegistryBuilder) {
        builder.component("TodoList", |c| {
            self.mutation(c, "NewTodo", |items, args: NewTodoArgs| {
                let text = args.text.trim();
                if text.is_empty() {
                    return Err(ActionError::new("todo text must not be empty"));
                }
                let id = items.iter().map(|i| i.id).max().unwrap_or(0).saturating_add(1);
                items.push(TodoItem {
                    id,
                    text: text.to_string(),
                    done: false,
                });
                Ok(None)
            });
            self.mutation(c, "ToggleItem", |items, args: IdArgs| {
                for item in items.iter_mut().filter(|i| i.id == args.id) {
                    item.done = !item.done;
                }
                Ok(None)
            });
            self.mutation(c, "ToggleAll", |items, _: NoArgs| {
                let all_done = items.iter().all(|i| i.done);
                for item in items.iter_mut() {
                    item.done = !all_done;
                }
                Ok(None)
            });
            self.mutation(c, "DeleteItem", |items, args: IdArgs| {
                items.retain(|i| i.id != args.id);
                Ok(None)
            });
            self.mutation(c, "ClearCompleted", |items, _: NoArgs| {
                items.retain(|i| !i.done);
                Ok(None)
            });
            self.mutation(c, "EditItem", |_items, args: IdArgs| Ok(Some(args.id)));
            self.mutation(c, "UpdateItem", |items, args: UpdateItemArgs| {
                let text = args.text.trim();
                for item in items.iter_mut().filter(|i| i.id == args.id) {
                    item.text = text.to_string();
                }
                Ok(None)
            });

            for filter in [Filter::All, Filter::Active, Filter::Completed] {
                let list = Arc::clone(self);
                c.page(
                    filter.path(),
                    page_fn(move |_ctx| {
                        let list = Arc::clone(&list);
                        async move {
                            let items = list.items.read().await;
                            let page: Box<dyn Page> = Box::new(TodoPage {
                                app: render_app(&items, filter, None),
                                state: TodoState {
                                    page: filter.page().to_string(),
                                },
                            });
                            Ok(page)
                        }
                    }),
                );
            }
        });
    }

    /// Registers an action that edits the list under the write lock and
    /// re-renders the app section for the filter in client state.
    fn mutation<T, F>(self: &Arc<Self>, scope: &mut ComponentScope<'_>, name: &str, apply: F)
    where
        T: DeserializeOwned + Default + Send + 'static,
        F: Fn(&mut Vec<TodoItem>, T) -> Result<Editing, ActionError> + Send + Sync + 'static,
    {
        let list = Arc::clone(self);
        let apply = Arc::new(apply);
        scope.action(
            name,
            typed_action(move |ctx: ActionContext, args: T| {
                let list = Arc::clone(&list);
                let apply = Arc::clone(&apply);
                async move {
                    let state: TodoState = ctx.parse_state()?;
                    let mut items = list.items.write().await;
                    let editing = apply(&mut items, args)?;
                    let app = render_app(&items, Filter::from_page(&state.page), editing);
                    Ok(Some(Update::replace_content(".todoapp", app.into_string())))
                }
            }),
        );
    }
}

struct TodoPage {
    app: Markup,
    state: TodoState,
}

impl TodoPage {
    fn section(&self) -> Markup {
        html! { section class="todoapp" { (self.app) } }
    }
}

impl Page for TodoPage {
    fn render_document(&self) -> Result<String, PageError> {
        let footer = html! {
            footer class="info" {
                p { "Double-click to edit a todo" }
                p { "Part of " a href="http://todomvc.com" { "TodoMVC" } }
                (nav_links())
            }
        };
        let preamble = script_var("state", &self.state)?;
        Ok(document(
            "guiapi • TodoMVC",
            TODOMVC_CSS,
            html! { main id="page" { (self.section()) } },
            footer,
            Some(preamble),
        )
        .into_string())
    }

    fn update(&self) -> Result<Update, PageError> {
        let state = serde_json::to_value(&self.state)?;
        Ok(Update::replace_content("#page", self.section().into_string()).with_state(state))
    }
}

fn render_app(items: &[TodoItem], filter: Filter, editing: Editing) -> Markup {
    html! {
        header class="header" {
            h1 { "todos" }
            input class="new-todo ga" name="new-todo" placeholder="What needs to be done?"
                autofocus ga-on="keydown" ga-func="newTodoKeydown";
        }
        @if !items.is_empty() {
            (render_main(items, filter, editing))
            (render_footer(items, filter))
        }
    }
}

fn render_main(items: &[TodoItem], filter: Filter, editing: Editing) -> Markup {
    html! {
        section class="main" {
            input id="toggle-all" class="toggle-all" type="checkbox";
            label class="ga" for="toggle-all" ga-on="click" ga-action="TodoList.ToggleAll" {
                "Mark all as complete"
            }
            ul class="todo-list" {
                @for item in items.iter().filter(|i| filter.keeps(i)) {
                    (render_item(item, editing == Some(item.id)))
                }
            }
        }
    }
}

fn render_item(item: &TodoItem, editing: bool) -> Markup {
    let args = format!(r#"{{"id":{}}}"#, item.id);
    if editing {
        return html! {
            li class="editing" {
                div class="view" {
                    input class="edit ga" ga-init="initEdit" ga-args=(args) value=(item.text);
                }
            }
        };
    }
    let dom_id = format!("todo-{}", item.id);
    let class = if item.done { "completed ga" } else { "active ga" };
    html! {
        li class=(class) ga-on="dblclick" ga-action="TodoList.EditItem" ga-args=(args) {
            div class="view" {
                input id=(dom_id) class="toggle ga" type="checkbox" checked[item.done]
                    ga-on="click" ga-action="TodoList.ToggleItem" ga-args=(args);
                label for=(dom_id) { (item.text) }
                button class="destroy ga" ga-on="click" ga-action="TodoList.DeleteItem" ga-args=(args) {}
            }
        }
    }
}

fn render_footer(items: &[TodoItem], filter: Filter) -> Markup {
    let left = items.iter().filter(|i| !i.done).count();
    let some_done = items.iter().any(|i| i.done);
    let selected = |f: Filter| if f == filter { "selected ga" } else { "ga" };
    html! {
        footer class="footer" {
            span class="todo-count" {
                strong { (left) }
                @if left == 1 { " item left" } @else { " items left" }
            }
            ul class="filters" {
                li { a class=(selected(Filter::All)) href="/" ga-link="" { "All" } }
                li { a class=(selected(Filter::Active)) href="/active" ga-link="" { "Active" } }
                li { a class=(selected(Filter::Completed)) href="/completed" ga-link="" { "Completed" } }
            }
            @if some_done {
                button class="clear-completed ga" ga-on="click" ga-action="TodoList.ClearCompleted" {
                    "Clear completed"
                }
            }
        }
    }
}
