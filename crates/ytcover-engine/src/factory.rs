use std::env;
use std::path::PathBuf;

use reqwest::blocking::Client as HttpClient;
use ytcover_contracts::config::{CoverGenConfig, Driver};

use crate::error::{CoverError, Result};
use crate::fallback::{ErrorReporter, FallbackProvider};
use crate::providers::gemini::GeminiProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::{default_http_client, non_blank};
use crate::CoverProvider;

/// `http` carries any timeout the caller wants; without one the provider
/// builds a client that never times out on its own.
pub fn create_openai(
    api_key: &str,
    http: Option<HttpClient>,
    output_path: Option<PathBuf>,
    model: Option<String>,
    size: Option<String>,
) -> Result<OpenAiProvider> {
    let mut provider = OpenAiProvider::new(api_key, output_path.unwrap_or_else(env::temp_dir))?;
    if let Some(http) = http {
        provider = provider.with_http_client(http);
    }
    if let Some(model) = non_blank(model.as_deref()) {
        provider = provider.with_model(model);
    }
    if let Some(size) = non_blank(size.as_deref()) {
        provider = provider.with_size(size);
    }
    Ok(provider)
}

pub fn create_gemini(
    api_key: &str,
    http: Option<HttpClient>,
    output_path: Option<PathBuf>,
    model: Option<String>,
) -> GeminiProvider {
    let provider = GeminiProvider::new(
        non_blank(Some(api_key)).map(str::to_string),
        http,
        output_path.unwrap_or_else(env::temp_dir),
    );
    match non_blank(model.as_deref()) {
        Some(model) => provider.with_model(model),
        None => provider,
    }
}

/// Builds the provider for `config.driver` alone.
pub fn build_primary_from_config(config: &CoverGenConfig) -> Result<Box<dyn CoverProvider>> {
    build_driver(config, config.driver)
}

/// Builds the configured driver and, when the other driver has an API key,
/// wraps both in a [`FallbackProvider`] with the configured driver first.
pub fn build_from_config(
    config: &CoverGenConfig,
    reporter: Option<ErrorReporter>,
) -> Result<Box<dyn CoverProvider>> {
    let primary = build_primary_from_config(config)?;
    let secondary_driver = config.driver.other();
    if non_blank(config.api_key_for(secondary_driver)).is_none() {
        return Ok(primary);
    }

    let secondary = build_driver(config, secondary_driver)?;
    tracing::debug!(
        primary = primary.name(),
        secondary = secondary.name(),
        "cover fallback enabled"
    );
    Ok(Box::new(
        FallbackProvider::from_boxed(primary, secondary).with_boxed_reporter(reporter),
    ))
}

fn build_driver(config: &CoverGenConfig, driver: Driver) -> Result<Box<dyn CoverProvider>> {
    let Some(api_key) = non_blank(config.api_key_for(driver)) else {
        return Err(CoverError::Configuration(format!(
            "missing API key for driver '{driver}'"
        )));
    };
    let output_path = config.output_path.clone();

    let provider: Box<dyn CoverProvider> = match driver {
        Driver::OpenAi => {
            let openai = &config.drivers.openai;
            Box::new(create_openai(
                api_key,
                None,
                output_path,
                openai.model.clone(),
                openai.size.clone(),
            )?)
        }
        Driver::Gemini => Box::new(create_gemini(
            api_key,
            Some(default_http_client()?),
            output_path,
            config.drivers.gemini.model.clone(),
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::path::PathBuf;
    use std::time::Duration;

    use httpmock::Method::POST;
    use httpmock::MockServer;
    use ytcover_contracts::config::{CoverGenConfig, Driver};

    use super::*;
    use crate::providers::gemini::DEFAULT_GEMINI_MODEL;
    use crate::providers::openai::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_SIZE};

    fn config_with_keys(driver: Driver, openai: Option<&str>, gemini: Option<&str>) -> CoverGenConfig {
        let mut config = CoverGenConfig {
            driver,
            output_path: Some(PathBuf::from("/srv/covers")),
            ..CoverGenConfig::default()
        };
        config.drivers.openai.api_key = openai.map(str::to_string);
        config.drivers.gemini.api_key = gemini.map(str::to_string);
        config
    }

    #[test]
    fn create_openai_applies_defaults() -> anyhow::Result<()> {
        let provider = create_openai("sk-test", None, None, None, None)?;
        assert_eq!(provider.model(), DEFAULT_OPENAI_MODEL);
        assert_eq!(provider.size(), DEFAULT_OPENAI_SIZE);
        assert_eq!(provider.output_dir(), env::temp_dir().as_path());
        Ok(())
    }

    #[test]
    fn create_openai_honours_overrides() -> anyhow::Result<()> {
        let provider = create_openai(
            "sk-test",
            Some(HttpClient::builder().timeout(Duration::from_secs(300)).build()?),
            Some(PathBuf::from("/srv/covers")),
            Some("gpt-image-1-mini".to_string()),
            Some("1024x1024".to_string()),
        )?;
        assert_eq!(provider.model(), "gpt-image-1-mini");
        assert_eq!(provider.size(), "1024x1024");
        assert_eq!(provider.output_dir(), PathBuf::from("/srv/covers").as_path());
        Ok(())
    }

    #[test]
    fn create_gemini_applies_defaults() {
        let provider = create_gemini("key", Some(HttpClient::new()), None, Some(" ".to_string()));
        assert_eq!(provider.model(), DEFAULT_GEMINI_MODEL);
        assert_eq!(provider.output_dir(), env::temp_dir().as_path());
    }

    #[test]
    fn create_openai_sends_through_injected_client() -> anyhow::Result<()> {
        if crate::test_support::should_skip_httpmock() {
            return Ok(());
        }
        let temp = tempfile::tempdir()?;
        let screenshot = crate::test_support::write_screenshot(temp.path(), "shot.jpg");
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/images/edits");
            then.status(200).delay(Duration::from_secs(3)).body("{}");
        });
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(200))
            .build()?;

        let err = create_openai("sk-test", Some(http), Some(temp.path().to_path_buf()), None, None)?
            .with_api_base(server.url("/v1"))
            .generate(&crate::GenerationRequest::new(screenshot, "G", "D"))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();

        assert!(err.contains("timed out"));
        Ok(())
    }

    #[test]
    fn single_key_builds_bare_provider() -> anyhow::Result<()> {
        let provider = build_from_config(&config_with_keys(Driver::OpenAi, Some("sk"), None), None)?;
        assert_eq!(provider.name(), "openai");

        let provider = build_from_config(&config_with_keys(Driver::Gemini, None, Some("gm")), None)?;
        assert_eq!(provider.name(), "gemini");
        Ok(())
    }

    #[test]
    fn second_key_enables_fallback_in_driver_order() -> anyhow::Result<()> {
        let provider = build_from_config(
            &config_with_keys(Driver::OpenAi, Some("sk"), Some("gm")),
            None,
        )?;
        assert_eq!(provider.name(), "openai->gemini");

        let provider = build_from_config(
            &config_with_keys(Driver::Gemini, Some("sk"), Some("gm")),
            Some(Box::new(|_: &CoverError| {})),
        )?;
        assert_eq!(provider.name(), "gemini->openai");
        Ok(())
    }

    #[test]
    fn primary_only_ignores_second_key() -> anyhow::Result<()> {
        let provider =
            build_primary_from_config(&config_with_keys(Driver::OpenAi, Some("sk"), Some("gm")))?;
        assert_eq!(provider.name(), "openai");
        Ok(())
    }

    #[test]
    fn missing_primary_key_is_a_configuration_error() {
        let err = build_from_config(&config_with_keys(Driver::OpenAi, None, Some("gm")), None)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(
            err,
            "configuration error: missing API key for driver 'openai'"
        );
    }
}
