/*!

Logging for the simulator.

The crate logs through the [`log`] facade: sweep progress at `info`, each run at `debug`,
solver step statistics at `trace`, isolated run failures at `warn`. Nothing is printed until
[`enable_logging`] installs a console logger (backed by `log4rs`). Levels can be changed at any
time, globally with [`set_log_level`] or per module with [`set_module_filter`].

```rust,no_run
use possum_tb::log::{LevelFilter, enable_logging, set_log_level, set_module_filter};

enable_logging()?;
set_log_level(LevelFilter::Debug)?;
set_module_filter("possum_tb::solver", LevelFilter::Trace)?;
# Ok::<(), possum_tb::TbError>(())
```

*/

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

pub use log::{LevelFilter, debug, error, info, trace, warn};
use log4rs::{
    Handle,
    append::console::ConsoleAppender,
    config::{Appender, Config, Logger, Root},
    encode::pattern::PatternEncoder,
};
use rustc_hash::FxHashMap;

use crate::error::TbError;

const APPENDER: &str = "stdout";
const PATTERN: &str = "{h({l})} [{M}] {m}{n}";
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

struct LogConfiguration {
    level: LevelFilter,
    module_filters: FxHashMap<String, LevelFilter>,
    // `None` until a logger has been installed; log4rs can only be installed once per process.
    handle: Option<Handle>,
}

fn build_config(
    level: LevelFilter,
    module_filters: &FxHashMap<String, LevelFilter>,
) -> Result<Config, TbError> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build(APPENDER, Box::new(console)));
    for (module, &module_level) in module_filters {
        builder = builder.logger(Logger::builder().build(module.clone(), module_level));
    }
    builder
        .build(Root::builder().appender(APPENDER).build(level))
        .map_err(|errors| TbError::TbError(format!("invalid log configuration: {errors}")))
}

impl LogConfiguration {
    /// Installs the logger on first use, otherwise swaps in the new settings. The stored
    /// settings only change once log4rs has accepted them.
    fn apply(
        &mut self,
        level: LevelFilter,
        module_filters: FxHashMap<String, LevelFilter>,
    ) -> Result<(), TbError> {
        let config = build_config(level, &module_filters)?;
        match &self.handle {
            Some(handle) => handle.set_config(config),
            None => {
                let handle = log4rs::init_config(config)
                    .map_err(|error| TbError::TbError(format!("cannot install logger: {error}")))?;
                self.handle = Some(handle);
            }
        }
        self.level = level;
        self.module_filters = module_filters;
        Ok(())
    }
}

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(|| {
    Mutex::new(LogConfiguration {
        level: LevelFilter::Off,
        module_filters: FxHashMap::default(),
        handle: None,
    })
});

fn configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Turns on console logging at the default level (`Info`).
pub fn enable_logging() -> Result<(), TbError> {
    set_log_level(DEFAULT_LEVEL)
}

/// Silences all output. Module filters are kept for the next time logging is enabled.
pub fn disable_logging() -> Result<(), TbError> {
    set_log_level(LevelFilter::Off)
}

pub fn set_log_level(level: LevelFilter) -> Result<(), TbError> {
    let mut configuration = configuration();
    let module_filters = configuration.module_filters.clone();
    configuration.apply(level, module_filters)
}

/// Overrides the level for `module` and everything below it, e.g. `possum_tb::solver`.
pub fn set_module_filter(module: &str, level: LevelFilter) -> Result<(), TbError> {
    let mut configuration = configuration();
    let mut module_filters = configuration.module_filters.clone();
    module_filters.insert(module.to_string(), level);
    let global = configuration.level;
    configuration.apply(global, module_filters)
}

pub fn remove_module_filter(module: &str) -> Result<(), TbError> {
    let mut configuration = configuration();
    let mut module_filters = configuration.module_filters.clone();
    if module_filters.remove(module).is_none() {
        return Ok(());
    }
    let global = configuration.level;
    configuration.apply(global, module_filters)
}

#[must_use]
pub fn log_level() -> LevelFilter {
    configuration().level
}
