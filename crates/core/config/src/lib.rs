use cached::proc_macro::cached;
use config::{Config, File, FileFormat};
use futures_locks::RwLock;
use once_cell::sync::Lazy;
use serde::Deserialize;

static CONFIG_BUILDER: Lazy<RwLock<Config>> = Lazy::new(|| {
    RwLock::new({
        let mut builder = Config::builder().add_source(File::from_str(
            include_str!("../Courier.toml"),
            FileFormat::Toml,
        ));

        if std::path::Path::new("Courier.toml").exists() {
            builder = builder.add_source(File::new("Courier.toml", FileFormat::Toml));
        }

        builder.build().unwrap()
    })
});

#[derive(Deserialize, Debug, Clone)]
pub struct Hosts {
    pub api: String,
    pub events: String,
    pub files: String,
    pub calls: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Client {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Defaults for the directory lookup batcher
#[derive(Deserialize, Debug, Clone)]
pub struct Directory {
    pub debounce_window_ms: u64,
    pub max_batch_size: usize,
    pub max_batch_wait_ms: u64,
    pub include_all_variants: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub hosts: Hosts,
    pub client: Client,
    pub directory: Directory,
}

pub async fn init() {
    println!(
        ":: Courier Configuration ::\n\x1b[32m{:?}\x1b[0m",
        config().await
    );
}

pub async fn read() -> Config {
    CONFIG_BUILDER.read().await.clone()
}

#[cached(time = 30)]
pub async fn config() -> Settings {
    read().await.try_deserialize::<Settings>().unwrap()
}

#[cfg(feature = "report-macros")]
#[macro_export]
macro_rules! report_internal_error {
    ( $expr: expr ) => {
        $expr.map_err(|err| {
            tracing::error!("Internal error occurred! {err:?}");

            courier_result::create_error!(InternalError)
        })
    };
}
