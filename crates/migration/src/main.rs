use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // DATABASE_URL wins; otherwise fall back to the monitor's config.yaml.
    if env::var("DATABASE_URL").is_err() {
        let settings = Config::builder()
            .add_source(config::File::with_name("config.yaml"))
            .build()
            .expect("config.yaml could not be read");
        if let Ok(url) = settings.get_string("database_url") {
            // The monitor substitutes its database password secret for `{0}`.
            let url = match env::var("CARTA_SECRET_DATABASE_PASSWORD") {
                Ok(password) => url.replace("{0}", &password),
                Err(_) => url,
            };
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
