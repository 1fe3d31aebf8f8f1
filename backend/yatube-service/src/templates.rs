/// HTML rendering with Tera
///
/// Every response rendered here carries a [`RenderedPage`] in its extensions,
/// naming the template and the context it was rendered with.
use actix_web::http::{header::ContentType, StatusCode};
use actix_web::HttpResponse;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Template and context behind a rendered response.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub template: String,
    pub context: serde_json::Value,
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Load every `*.html` file under `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let pattern = format!("{}/**/*.html", dir.display());
        let tera = Tera::new(&pattern)?;

        let count = tera.get_template_names().count();
        if count == 0 {
            return Err(AppError::TemplateError(format!(
                "no templates found under {}",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), count, "Templates loaded");

        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template, context)?)
    }

    /// Render `template` into a response with the given status.
    pub fn render_response(
        &self,
        status: StatusCode,
        template: &str,
        context: &Context,
    ) -> Result<HttpResponse> {
        let body = self.render(template, context)?;
        debug!(template, status = status.as_u16(), "Rendered template");
        Ok(Self::respond(status, template, context, body))
    }

    /// Wrap an already rendered `body` into a response.
    pub fn respond(
        status: StatusCode,
        template: &str,
        context: &Context,
        body: String,
    ) -> HttpResponse {
        let mut response = HttpResponse::build(status)
            .insert_header(ContentType::html())
            .body(body);
        response.extensions_mut().insert(RenderedPage {
            template: template.to_string(),
            context: context.clone().into_json(),
        });
        response
    }

    pub fn page(&self, template: &str, context: &Context) -> Result<HttpResponse> {
        self.render_response(StatusCode::OK, template, context)
    }
}
