use crate::api::client::AnonApiClient;
use crate::cli::interactive_view::InteractiveView;
use crate::cli::main_types::{AuthCommands, Commands, ConfigCommands};
use crate::core::auth::TokenInput;
use crate::core::session::Tab;
use crate::core::view::ResultView;
use crate::display::TableDisplay;
use crate::error::{AppError, CliError, ConfigError};
use crate::storage::config::Config;
use crate::storage::credentials::{Credentials, TokenSource};
use std::path::PathBuf;

const DEFAULT_PAGE_SIZE: usize = 20;

pub struct Dispatcher {
    config: Config,
    config_path: Option<PathBuf>,
    credentials: Credentials,
    verbose: bool,
    session_token_override: Option<String>,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        credentials: Credentials,
        verbose: bool,
        session_token_override: Option<String>,
    ) -> Self {
        Self {
            config,
            config_path,
            credentials,
            verbose,
            session_token_override,
        }
    }

    fn log_verbose(&self, msg: &str) {
        crate::utils::logging::print_verbose(self.verbose, msg);
    }

    pub async fn dispatch(&mut self, command: Commands) -> Result<(), AppError> {
        match command {
            Commands::Auth { command } => self.handle_auth_command(command).await,
            Commands::Config { command } => self.handle_config_command(command).await,
            Commands::View {
                task_id,
                page,
                no_interactive,
                download,
            } => {
                self.handle_view_command(&task_id, page, no_interactive, download)
                    .await
            }
        }
    }

    async fn handle_auth_command(&self, command: AuthCommands) -> Result<(), AppError> {
        match command {
            AuthCommands::Login => {
                self.log_verbose("Attempting auth login command");
                let input = TokenInput::collect()?;
                input.validate()?;
                Credentials::save_session_for_profile(
                    &self.credentials.profile_name,
                    &input.session_token,
                )?;
                println!(
                    "✅ Session token stored for profile: {}",
                    self.credentials.profile_name
                );
                Ok(())
            }
            AuthCommands::Logout => {
                self.log_verbose("Attempting auth logout command");
                Credentials::clear_session_for_profile(&self.credentials.profile_name)?;
                println!(
                    "✅ Session token cleared for profile: {}",
                    self.credentials.profile_name
                );
                Ok(())
            }
            AuthCommands::Status => {
                self.log_verbose("Attempting auth status command");
                println!("Authentication Status:");
                println!("=====================");

                match self.credentials.token_source() {
                    TokenSource::Environment => {
                        println!("Token source: environment (ANV_SESSION_TOKEN)");
                    }
                    TokenSource::Keyring => {
                        println!("Token source: OS keyring");
                        match self.credentials.get_session_token() {
                            Some(_) => println!("Session: token stored"),
                            None => println!("Session: no token; run 'anv-cli auth login'"),
                        }
                    }
                }

                println!("\nActive Profile: {}", self.credentials.profile_name);
                if let Some(profile) = self.config.get_profile(&self.credentials.profile_name) {
                    println!("API URL: {}", profile.api_url);
                    if let Some(user_id) = &profile.user_id {
                        println!("User ID: {}", user_id);
                    }
                }
                Ok(())
            }
        }
    }

    async fn handle_config_command(&mut self, command: ConfigCommands) -> Result<(), AppError> {
        match command {
            ConfigCommands::Show => {
                self.log_verbose("Attempting config show command");
                println!("Current Configuration:");
                println!("=====================");

                if let Some(default_profile) = &self.config.default_profile {
                    println!("Default Profile: {}", default_profile);
                } else {
                    println!("Default Profile: (not set)");
                }

                println!("\nProfiles:");
                if self.config.profiles.is_empty() {
                    println!("  No profiles configured");
                } else {
                    for (name, profile) in &self.config.profiles {
                        println!("  [{}]", name);
                        println!("    API URL: {}", profile.api_url);
                        if let Some(user_id) = &profile.user_id {
                            println!("    User ID: {}", user_id);
                        }
                        if let Some(timeout) = profile.timeout_seconds {
                            println!("    Timeout: {} seconds", timeout);
                        }
                        if let Some(page_size) = profile.page_size {
                            println!("    Page size: {}", page_size);
                        }
                    }
                }
                Ok(())
            }
            ConfigCommands::Set { key, value } => {
                self.log_verbose(&format!(
                    "Attempting config set - key: {}, value: {}",
                    key, value
                ));
                self.set_config_value(&key, &value)?;
                self.config
                    .save(self.config_path.clone())
                    .map_err(AppError::Storage)?;
                println!("✅ Set {} = {}", key, value);
                Ok(())
            }
        }
    }

    fn set_config_value(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        if key == "default_profile" {
            self.config.default_profile = Some(value.to_string());
            return Ok(());
        }

        let profile_name = self.credentials.profile_name.clone();
        let profile = self
            .config
            .profiles
            .get_mut(&profile_name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: profile_name.clone(),
                hint: "run any command once to create the default profile".to_string(),
            })?;

        match key {
            "api_url" => profile.api_url = value.to_string(),
            "user_id" => profile.user_id = Some(value.to_string()),
            "timeout_seconds" => {
                profile.timeout_seconds =
                    Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                        field: key.to_string(),
                        value: value.to_string(),
                        reason: "expected a positive integer".to_string(),
                    })?)
            }
            "page_size" => {
                profile.page_size =
                    Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                        field: key.to_string(),
                        value: value.to_string(),
                        reason: "expected a positive integer".to_string(),
                    })?)
            }
            _ => {
                return Err(AppError::Cli(CliError::InvalidArguments(format!(
                    "Unknown configuration key: {}",
                    key
                ))));
            }
        }
        Ok(())
    }

    fn build_client(&self) -> Result<AnonApiClient, AppError> {
        let profile = self
            .config
            .get_profile(&self.credentials.profile_name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: self.credentials.profile_name.clone(),
                hint: "configure a profile with 'anv-cli config set api_url <url>'".to_string(),
            })?;

        let token = self
            .session_token_override
            .clone()
            .or_else(|| self.credentials.get_session_token())
            .ok_or_else(|| {
                AppError::Cli(CliError::AuthRequired {
                    message: "No session token available".to_string(),
                    hint: "run 'anv-cli auth login' or set ANV_SESSION_TOKEN".to_string(),
                })
            })?;

        let client =
            AnonApiClient::with_auth(profile.api_url.clone(), token, profile.user_id.clone())?;
        Ok(client)
    }

    async fn handle_view_command(
        &self,
        task_id: &str,
        page: Option<u32>,
        no_interactive: bool,
        download: Option<PathBuf>,
    ) -> Result<(), AppError> {
        self.log_verbose(&format!(
            "Attempting view command - task: {}, page: {:?}",
            task_id, page
        ));

        let client = self.build_client()?;
        let mut view = ResultView::new(client);
        view.open(task_id).await;

        if let Some(page_number) = page {
            view.set_tab(Tab::PerPage).await;
            let index = view
                .session()
                .page_list()
                .iter()
                .position(|p| p.page_number == page_number);
            match index {
                Some(index) => view.select_page(index).await,
                None => crate::utils::logging::log_warning(&format!(
                    "Page {} not found; showing the first page",
                    page_number
                )),
            }
        }

        if let Some(path) = download {
            let export = view.export_mapping().await?;
            let target = if path.is_dir() {
                path.join(&export.file_name)
            } else {
                path
            };
            std::fs::write(&target, &export.bytes).map_err(|source| {
                AppError::Storage(crate::error::StorageError::FileIo {
                    path: target.to_string_lossy().to_string(),
                    source,
                })
            })?;
            println!("✅ Mapping saved to {}", target.display());
            return Ok(());
        }

        let display = TableDisplay::new();
        if no_interactive || !atty::is(atty::Stream::Stdout) {
            println!("{}", display.render_page_strip(view.session()));
            let preview = view.preview_url().await;
            println!("{}", display.render_preview(preview.as_deref()));
            println!("{}", display.render_panel(&view.panel())?);
            return Ok(());
        }

        let page_size = self
            .config
            .get_profile(&self.credentials.profile_name)
            .and_then(|p| p.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        InteractiveView::new(page_size).run(&mut view, &display).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::Profile;
    use std::collections::HashMap;

    fn create_test_dispatcher(verbose: bool) -> Dispatcher {
        let config = Config {
            default_profile: Some("test".to_string()),
            profiles: {
                let mut profiles = HashMap::new();
                profiles.insert(
                    "test".to_string(),
                    Profile {
                        api_url: "http://example.test".to_string(),
                        user_id: Some("user-1".to_string()),
                        timeout_seconds: Some(30),
                        page_size: Some(20),
                    },
                );
                profiles
            },
        };
        let creds = Credentials::new("test".to_string());
        Dispatcher::new(config, None, creds, verbose, Some("token".to_string()))
    }

    #[tokio::test]
    async fn test_auth_logout_succeeds() {
        let d = create_test_dispatcher(true);
        let result = d.handle_auth_command(AuthCommands::Logout).await;
        assert!(result.is_ok(), "Auth logout should succeed with mock keyring");
    }

    #[tokio::test]
    async fn test_auth_status_succeeds() {
        let d = create_test_dispatcher(true);
        assert!(d.handle_auth_command(AuthCommands::Status).await.is_ok());
    }

    #[tokio::test]
    async fn test_config_show_succeeds() {
        let mut d = create_test_dispatcher(true);
        assert!(d.handle_config_command(ConfigCommands::Show).await.is_ok());
    }

    #[test]
    fn test_set_config_value_updates_profile() {
        let mut d = create_test_dispatcher(false);
        d.set_config_value("api_url", "http://other.test").unwrap();
        assert_eq!(
            d.config.get_profile("test").unwrap().api_url,
            "http://other.test"
        );

        d.set_config_value("page_size", "50").unwrap();
        assert_eq!(d.config.get_profile("test").unwrap().page_size, Some(50));
    }

    #[test]
    fn test_set_config_value_rejects_unknown_key() {
        let mut d = create_test_dispatcher(false);
        let result = d.set_config_value("nonsense", "value");
        assert!(matches!(
            result,
            Err(AppError::Cli(CliError::InvalidArguments(_)))
        ));
    }

    #[test]
    fn test_set_config_value_rejects_bad_number() {
        let mut d = create_test_dispatcher(false);
        let result = d.set_config_value("timeout_seconds", "soon");
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_build_client_uses_override_token() {
        let d = create_test_dispatcher(false);
        let client = d.build_client().unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.base_url, "http://example.test");
    }

    #[test]
    fn test_build_client_without_token_requires_auth() {
        let mut d = create_test_dispatcher(false);
        d.session_token_override = None;
        // Mock keyring holds no token in tests
        let result = d.build_client();
        assert!(matches!(
            result,
            Err(AppError::Cli(CliError::AuthRequired { .. }))
        ));
    }
}
