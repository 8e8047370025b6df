use scraper::ElementRef;
use tracing::{debug, error, info};

use crate::browser::{Browser, BrowserError, Form, Page};
use crate::definition::{compile_selector, ErrorRule, LoginBlock};
use crate::error::IndexerError;
use crate::extract::block_value;
use crate::filter::FilterContext;
use crate::metrics;
use crate::template::{resolve, TemplateContext};

use super::Runner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    PageOpened,
    FormFilled,
    Submitted,
    LoggedIn,
    Failed,
}

/// One login attempt. No retries; a failed flow stays failed.
pub struct LoginFlow<'a> {
    runner: &'a Runner,
    login: &'a LoginBlock,
    state: LoginState,
}

impl<'a> LoginFlow<'a> {
    pub fn new(runner: &'a Runner, login: &'a LoginBlock) -> Self {
        Self {
            runner,
            login,
            state: LoginState::Start,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn advance(&mut self, next: LoginState) {
        debug!(site = %self.runner.site(), from = ?self.state, to = ?next, "Login state changed");
        self.state = next;
    }

    pub async fn run(&mut self, browser: &mut dyn Browser) -> Result<(), IndexerError> {
        let site = self.runner.site().to_string();

        match self.steps(browser).await {
            Ok(()) => {
                self.advance(LoginState::LoggedIn);
                metrics::LOGINS_TOTAL.with_label_values(&[site.as_str(), "success"]).inc();
                info!(site = %site, "Successfully logged in");
                Ok(())
            }
            Err(e) => {
                self.advance(LoginState::Failed);
                let result = match e {
                    IndexerError::Login(_) => "rejected",
                    _ => "failed",
                };
                metrics::LOGINS_TOTAL.with_label_values(&[site.as_str(), result]).inc();
                error!(site = %site, error = %e, "Failed to login");
                Err(e)
            }
        }
    }

    async fn steps(&mut self, browser: &mut dyn Browser) -> Result<(), IndexerError> {
        let login_url = self.runner.resolve_path(browser, &self.login.path)?;
        self.runner.open_page(browser, &login_url).await?;
        self.advance(LoginState::PageOpened);

        let form = self.fill_form(browser)?;
        self.advance(LoginState::FormFilled);

        debug!(site = %self.runner.site(), action = %form.action, "Submitting login form");
        browser.submit(&form).await?;
        debug!(
            site = %self.runner.site(),
            code = ?browser.status_code(),
            page = ?browser.url().map(|u| u.as_str()),
            "Finished request"
        );
        self.advance(LoginState::Submitted);

        let page = browser.page().ok_or(BrowserError::NoPage)?;
        let ctx = self.runner.filter_context();
        match detect_error(page, &self.login.errors, &ctx)? {
            Some(reason) => Err(IndexerError::Login(reason)),
            None => Ok(()),
        }
    }

    fn fill_form(&self, browser: &dyn Browser) -> Result<Form, IndexerError> {
        let page = browser.page().ok_or(BrowserError::NoPage)?;
        let mut form = Form::from_page(page, &self.login.form_selector)?;

        let section = self.runner.config.section(self.runner.site())?;
        let ctx = TemplateContext::login(&section);

        for (name, template) in &self.login.inputs {
            debug!(
                site = %self.runner.site(),
                key = %name,
                form = %self.login.form_selector,
                "Filling input of form"
            );
            let value = resolve("login_inputs", template, &ctx)?;
            form.set(name, value)?;
        }

        Ok(form)
    }
}

/// Check the post-login page against the error rules; `Some(reason)` when
/// one matches.
fn detect_error(
    page: &Page,
    rules: &[ErrorRule],
    ctx: &FilterContext<'_>,
) -> Result<Option<String>, IndexerError> {
    let document = page.document();
    let root = document.root_element();

    for rule in rules {
        let matched: Option<String> = match (&rule.selector, &rule.contains) {
            (Some(selector), contains) => {
                let selector = compile_selector(selector)?;
                root.select(&selector)
                    .map(|el| element_text(&el))
                    .find(|text| contains.as_ref().map_or(true, |c| text.contains(c.as_str())))
            }
            (None, Some(contains)) => {
                let text = element_text(&root);
                text.contains(contains.as_str()).then(|| contains.clone())
            }
            (None, None) => None,
        };

        let Some(matched) = matched else {
            continue;
        };

        let message = match &rule.message {
            Some(block) => block_value(root, block, ctx)?,
            None => String::new(),
        };

        let reason = [message, matched]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| "login error rule matched".to_string());
        return Ok(Some(reason));
    }

    Ok(None)
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
