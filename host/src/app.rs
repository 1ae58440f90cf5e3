//! Demo application: the stores behind the public query schema, wired to
//! an in-memory address bar.

use std::rc::Rc;

use serde_json::json;
use urlsync_engine::codec::try_decode;
use urlsync_engine::{
    Cascade, Clock, MemoryRouter, Query, Registry, Signal, SyncContext, SyncController,
    WriteOptions,
};

use crate::command::{Command, Reply};
use crate::config::Config;
use crate::error::{AppError, Result};

pub const DEFAULT_PANEL: &str = "dashboard";
pub const DEFAULT_YEAR: f64 = 2024.0;

/// Application stores, one signal per query key.
#[derive(Debug, Clone)]
pub struct Stores {
    pub dark: Signal<bool>,
    pub sidebar_open: Signal<bool>,
    pub panel: Signal<String>,
    pub products: Signal<Vec<String>>,
    pub countries: Signal<Vec<String>>,
    pub year: Signal<f64>,
    pub carbon_cost: Signal<f64>,
    pub price_growth: Signal<f64>,
    pub tariff: Signal<f64>,
    pub export_growth: Signal<f64>,
    /// Derived from `dark` by the theme cascade; not in the URL
    pub theme: Signal<String>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            dark: Signal::new(false),
            sidebar_open: Signal::new(true),
            panel: Signal::new(DEFAULT_PANEL.to_string()),
            products: Signal::new(Vec::new()),
            countries: Signal::new(Vec::new()),
            year: Signal::new(DEFAULT_YEAR),
            carbon_cost: Signal::new(0.0),
            price_growth: Signal::new(0.0),
            tariff: Signal::new(0.0),
            export_growth: Signal::new(0.0),
            theme: Signal::new("light".to_string()),
        }
    }

    /// Bind every store to its query key.
    pub fn registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        registry
            .bind("dark", false, &self.dark)?
            .bind("sb", true, &self.sidebar_open)?
            .bind("pnl", DEFAULT_PANEL.to_string(), &self.panel)?
            .bind("pr", Vec::new(), &self.products)?
            .bind("cty", Vec::new(), &self.countries)?
            .bind("yr", DEFAULT_YEAR, &self.year)?
            .bind("cc", 0.0, &self.carbon_cost)?
            .bind("pg", 0.0, &self.price_growth)?
            .bind("tp", 0.0, &self.tariff)?
            .bind("eg", 0.0, &self.export_growth)?;
        Ok(registry)
    }

    /// Values as JSON, for display.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "dark": self.dark.get(),
            "sidebarOpen": self.sidebar_open.get(),
            "panel": self.panel.get(),
            "products": self.products.get(),
            "countries": self.countries.get(),
            "year": self.year.get(),
            "carbonCost": self.carbon_cost.get(),
            "priceGrowth": self.price_growth.get(),
            "tariff": self.tariff.get(),
            "exportGrowth": self.export_growth.get(),
            "theme": self.theme.get(),
        })
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one command for the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue(Reply),
    Help,
    Quit,
}

pub struct App {
    pub stores: Stores,
    pub router: Rc<MemoryRouter>,
    pub controller: SyncController,
}

impl App {
    pub fn build(config: &Config, clock: Rc<dyn Clock>) -> Result<Self> {
        let stores = Stores::new();
        let registry = stores.registry()?;

        let router = Rc::new(MemoryRouter::from_query_string(&config.initial_query));
        let ctx = SyncContext::new(registry, clock, config.sync_config());
        let controller = SyncController::new(ctx, router.clone());
        controller.attach();

        let theme = stores.theme.clone();
        controller.add_cascade(Cascade::on("theme", &stores.dark).target(
            "ui-theme",
            0,
            move |dark: &bool| {
                theme.set(if *dark { "dark" } else { "light" }.to_string());
                Ok(())
            },
        ));

        tracing::info!(
            entries = controller.context().registry().len(),
            initial = %router.url(),
            "demo application built"
        );

        Ok(Self {
            stores,
            router,
            controller,
        })
    }

    /// Signal readiness and report how many queries were applied.
    pub fn ready(&self) -> Result<usize> {
        let applied = self.controller.signal_ready()?;
        tracing::info!(applied, url = %self.router.url(), "stores loaded, sync is live");
        Ok(applied)
    }

    /// Change a store the way a user would. Tokens use the URL syntax of
    /// the key, so `set cty DEU,BRA` works.
    pub fn set(&self, key: &str, token: &str) -> Result<()> {
        write_token(self.controller.context().registry(), key, token)
    }

    pub fn execute(&self, command: Command) -> Result<Flow> {
        let reply = match command {
            Command::Set { key, value } => {
                self.set(&key, &value)?;
                Reply::Ok
            }
            Command::Navigate { query } => {
                self.router.navigate(Query::parse(&query));
                self.show()
            }
            Command::Ready => {
                self.ready()?;
                self.show()
            }
            Command::Sync => {
                self.controller.sync_now();
                self.url()
            }
            Command::Pause => {
                self.controller.pause();
                Reply::Ok
            }
            Command::Resume => {
                self.controller.resume();
                Reply::Ok
            }
            Command::Reset => {
                self.controller.reset_to_defaults();
                self.show()
            }
            Command::Show => self.show(),
            Command::Conflicts => Reply::State {
                state: serde_json::to_value(self.controller.state())?,
            },
            Command::Resolve { id, resolution } => {
                self.controller.resolve_conflict(id, resolution)?;
                Reply::Ok
            }
            Command::Share => Reply::Url {
                url: self.controller.share_query(),
            },
            Command::Help => return Ok(Flow::Help),
            Command::Quit => return Ok(Flow::Quit),
        };
        Ok(Flow::Continue(reply))
    }

    fn url(&self) -> Reply {
        Reply::Url {
            url: self.router.url(),
        }
    }

    fn show(&self) -> Reply {
        Reply::Stores {
            url: self.router.url(),
            stores: self.stores.snapshot(),
        }
    }
}

/// Decode a URL token for `key` and write it as a user edit. The write is
/// not silent, so the engine schedules an outbound flush.
fn write_token(registry: &Registry, key: &str, token: &str) -> Result<()> {
    let entry = registry
        .get(key)
        .ok_or_else(|| AppError::UnknownKey(key.to_string()))?;
    let value = try_decode(token, entry.kind())?;
    entry.write(value, WriteOptions::default())?;
    Ok(())
}
