//! Setup command - Collect, verify and save credentials

use std::path::PathBuf;

use clap::Args;
use console::style;
use dialoguer::theme::ColorfulTheme;

use super::credentials::{open_store, prompt_all, validate};

/// Arguments for the setup command
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Credentials file to read and write
    #[arg(long, env = "TRIAD_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Save without checking the credentials against GitHub and Jira
    #[arg(long)]
    pub skip_check: bool,
}

impl SetupArgs {
    /// Execute the setup command
    pub async fn execute(&self) -> anyhow::Result<()> {
        let store = open_store(self.env_file.as_deref())?;
        let mut creds = store.load()?;
        let theme = ColorfulTheme::default();

        println!("  {}", style("Triad setup").bold());
        println!("  {}", style(format!("Credentials file: {}", store.path().display())).dim());

        prompt_all(&theme, &mut creds).await?;

        if !self.skip_check {
            println!();
            validate(Some(&theme), &mut creds).await?;
        }

        store.save(&creds)?;
        println!();
        println!(
            "  {} Credentials saved to {}",
            style("✓").green(),
            store.path().display()
        );
        Ok(())
    }
}
