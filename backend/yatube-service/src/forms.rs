/// Forms for posts, comments and accounts
///
/// Each form validates raw submitted values and produces either the values to
/// write or field errors to show next to the inputs. Forms also describe
/// themselves for templates: field kind, label, help text, current value and
/// errors.
use actix_multipart::Multipart;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{Comment, FieldMeta, Group, Post};
use crate::security::password::password_problems;

pub const REQUIRED_MESSAGE: &str = "Обязательное поле.";
pub const INVALID_CHOICE_MESSAGE: &str =
    "Выберите корректный вариант. Вашего варианта нет среди допустимых значений.";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Загрузите правильное изображение. Файл, который вы загрузили, поврежден или не является изображением.";

/// Directory under the media root that post images are written to.
pub const POST_IMAGE_DIR: &str = "posts";

const ACCEPTED_IMAGE_FORMATS: &[image::ImageFormat] = &[
    image::ImageFormat::Png,
    image::ImageFormat::Jpeg,
    image::ImageFormat::Gif,
    image::ImageFormat::WebP,
    image::ImageFormat::Bmp,
];

/// Field name to messages; `__all__` holds errors not tied to one field.
pub type FormErrors = BTreeMap<String, Vec<String>>;

pub const NON_FIELD_ERRORS: &str = "__all__";

fn add_error(errors: &mut FormErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

fn field_context(meta: Option<&FieldMeta>, name: &str, kind: &str, required: bool) -> Value {
    json!({
        "name": name,
        "kind": kind,
        "required": required,
        "label": meta.map(|m| m.label).unwrap_or(name),
        "help_text": meta.map(|m| m.help_text).unwrap_or(""),
    })
}

fn with_state(mut field: Value, value: Value, errors: &FormErrors, name: &str) -> Value {
    field["value"] = value;
    field["errors"] = json!(errors.get(name).cloned().unwrap_or_default());
    field
}

// =====================================================================
// Post form
// =====================================================================

/// URL-encoded post form body
#[derive(Debug, Default, Deserialize)]
pub struct PostFormInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: String,
}

/// A file submitted in the `image` field
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw values of a submitted post form
#[derive(Debug, Default, Clone)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedImage>,
}

/// A checked image ready to be stored
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub bytes: Vec<u8>,
    pub format: image::ImageFormat,
}

/// Values of a valid post form
#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ValidImage>,
}

#[derive(Debug, Validate)]
struct TextInput {
    #[validate(length(min = 1))]
    text: String,
}

fn clean_text(raw: &str, errors: &mut FormErrors) -> String {
    let input = TextInput {
        text: raw.trim().to_string(),
    };
    if let Err(e) = input.validate() {
        if e.field_errors().contains_key("text") {
            add_error(errors, "text", REQUIRED_MESSAGE);
        }
    }
    input.text
}

/// Check that `bytes` decode as one of the accepted image formats.
pub fn validate_image(bytes: &[u8]) -> std::result::Result<image::ImageFormat, String> {
    let format = image::guess_format(bytes).map_err(|_| INVALID_IMAGE_MESSAGE.to_string())?;
    if !ACCEPTED_IMAGE_FORMATS.contains(&format) {
        return Err(INVALID_IMAGE_MESSAGE.to_string());
    }
    image::load_from_memory_with_format(bytes, format)
        .map_err(|_| INVALID_IMAGE_MESSAGE.to_string())?;
    Ok(format)
}

impl From<PostFormInput> for PostForm {
    fn from(input: PostFormInput) -> Self {
        PostForm {
            text: input.text,
            group: input.group,
            image: None,
        }
    }
}

impl PostForm {
    /// Prefilled form for editing an existing post.
    pub fn for_post(text: &str, group_id: Option<i64>) -> Self {
        PostForm {
            text: text.to_string(),
            group: group_id.map(|id| id.to_string()).unwrap_or_default(),
            image: None,
        }
    }

    /// Read a `multipart/form-data` submission, limiting the whole body to
    /// `max_bytes`.
    pub async fn from_multipart(mut payload: Multipart, max_bytes: usize) -> Result<Self> {
        let mut form = PostForm::default();
        let mut total_bytes: usize = 0;

        while let Some(item) = payload.next().await {
            let mut field =
                item.map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?;
            let name = field.name().to_string();
            let filename = field
                .content_disposition()
                .get_filename()
                .map(str::to_string);

            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?;
                total_bytes += chunk.len();
                if total_bytes > max_bytes {
                    return Err(AppError::BadRequest(format!(
                        "Upload exceeds {} bytes",
                        max_bytes
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }

            match name.as_str() {
                "text" => form.text = String::from_utf8_lossy(&bytes).into_owned(),
                "group" => form.group = String::from_utf8_lossy(&bytes).into_owned(),
                "image" => {
                    // An empty file input still sends a part with no filename
                    let filename = filename.unwrap_or_default();
                    if !filename.is_empty() || !bytes.is_empty() {
                        form.image = Some(UploadedImage { filename, bytes });
                    }
                }
                other => debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    pub fn validate(&self, groups: &[Group]) -> std::result::Result<CleanPost, FormErrors> {
        let mut errors = FormErrors::new();

        let text = clean_text(&self.text, &mut errors);

        let raw_group = self.group.trim();
        let group_id = if raw_group.is_empty() {
            None
        } else {
            match raw_group.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    add_error(&mut errors, "group", INVALID_CHOICE_MESSAGE);
                    None
                }
            }
        };

        let image = match &self.image {
            Some(upload) => match validate_image(&upload.bytes) {
                Ok(format) => Some(ValidImage {
                    bytes: upload.bytes.clone(),
                    format,
                }),
                Err(message) => {
                    add_error(&mut errors, "image", message);
                    None
                }
            },
            None => None,
        };

        if errors.is_empty() {
            Ok(CleanPost {
                text,
                group_id,
                image,
            })
        } else {
            Err(errors)
        }
    }

    /// Template description of the form
    pub fn context(&self, groups: &[Group], errors: &FormErrors) -> Value {
        let mut choices = vec![json!({ "value": "", "label": "---------" })];
        choices.extend(
            groups
                .iter()
                .map(|g| json!({ "value": g.id.to_string(), "label": g.title })),
        );

        let mut group = field_context(Post::field("group"), "group", "choice", false);
        group["choices"] = json!(choices);

        json!({
            "fields": {
                "text": with_state(
                    field_context(Post::field("text"), "text", "char", true),
                    json!(self.text),
                    errors,
                    "text",
                ),
                "group": with_state(group, json!(self.group), errors, "group"),
                "image": with_state(
                    field_context(Post::field("image"), "image", "image", false),
                    Value::Null,
                    errors,
                    "image",
                ),
            },
            "errors": errors,
            "is_bound": !errors.is_empty(),
        })
    }
}

/// Write a validated image to `<media_root>/posts/<uuid>.<ext>`, returning the
/// path relative to the media root.
pub async fn save_post_image(media_root: &Path, image: &ValidImage) -> Result<String> {
    let ext = image.format.extensions_str().first().copied().unwrap_or("img");
    let relative = format!("{}/{}.{}", POST_IMAGE_DIR, Uuid::new_v4(), ext);

    let dir = media_root.join(POST_IMAGE_DIR);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(media_root.join(&relative), &image.bytes).await?;

    info!(path = %relative, bytes = image.bytes.len(), "Stored post image");
    Ok(relative)
}

// =====================================================================
// Comment form
// =====================================================================

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> std::result::Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let text = clean_text(&self.text, &mut errors);
        if errors.is_empty() {
            Ok(text)
        } else {
            Err(errors)
        }
    }

    pub fn context(&self, errors: &FormErrors) -> Value {
        json!({
            "fields": {
                "text": with_state(
                    field_context(Comment::field("text"), "text", "char", true),
                    json!(self.text),
                    errors,
                    "text",
                ),
            },
            "errors": errors,
            "is_bound": !errors.is_empty(),
        })
    }
}

// =====================================================================
// Account forms
// =====================================================================

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Where to go after logging in
    #[serde(default)]
    pub next: String,
}

impl LoginForm {
    /// Both fields present; credentials are checked by the handler.
    pub fn validate(&self) -> std::result::Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.username.trim().is_empty() {
            add_error(&mut errors, "username", REQUIRED_MESSAGE);
        }
        if self.password.is_empty() {
            add_error(&mut errors, "password", REQUIRED_MESSAGE);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn context(&self, errors: &FormErrors) -> Value {
        json!({
            "fields": {
                "username": {
                    "name": "username", "kind": "char", "label": "Имя пользователя",
                    "value": self.username,
                    "errors": errors.get("username").cloned().unwrap_or_default(),
                },
                "password": {
                    "name": "password", "kind": "password", "label": "Пароль",
                    "errors": errors.get("password").cloned().unwrap_or_default(),
                },
            },
            "errors": errors,
            "non_field_errors": errors.get(NON_FIELD_ERRORS).cloned().unwrap_or_default(),
        })
    }
}

pub fn invalid_login_errors() -> FormErrors {
    let mut errors = FormErrors::new();
    add_error(
        &mut errors,
        NON_FIELD_ERRORS,
        "Пожалуйста, введите правильные имя пользователя и пароль.",
    );
    errors
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

/// Values of a valid signup form
#[derive(Debug, Clone)]
pub struct CleanSignup {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn username_chars_ok(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

impl SignupForm {
    /// Validate everything except username availability, which needs the
    /// repository.
    pub fn validate_fields(&self) -> std::result::Result<CleanSignup, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim().to_string();

        let trimmed = SignupForm {
            username: username.clone(),
            email: self.email.trim().to_string(),
            ..self.clone()
        };
        if let Err(e) = trimmed.validate() {
            let fields = e.field_errors();
            if fields.contains_key("username") {
                if username.is_empty() {
                    add_error(&mut errors, "username", REQUIRED_MESSAGE);
                } else {
                    add_error(
                        &mut errors,
                        "username",
                        "Имя пользователя должно быть не длиннее 150 символов.",
                    );
                }
            }
            if fields.contains_key("email") && !trimmed.email.is_empty() {
                add_error(&mut errors, "email", "Введите правильный адрес электронной почты.");
            }
        }
        if !username.is_empty() && !username_chars_ok(&username) {
            add_error(
                &mut errors,
                "username",
                "Введите правильное имя пользователя. Оно может содержать только буквы, цифры и знаки @/./+/-/_.",
            );
        }

        if self.password1.is_empty() {
            add_error(&mut errors, "password1", REQUIRED_MESSAGE);
        }
        if self.password2.is_empty() {
            add_error(&mut errors, "password2", REQUIRED_MESSAGE);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                add_error(&mut errors, "password2", "Введенные пароли не совпадают.");
            } else {
                for problem in password_problems(&self.password1, &username) {
                    add_error(&mut errors, "password2", problem);
                }
            }
        }

        if errors.is_empty() {
            Ok(CleanSignup {
                username,
                first_name: self.first_name.trim().to_string(),
                last_name: self.last_name.trim().to_string(),
                password: self.password1.clone(),
            })
        } else {
            Err(errors)
        }
    }

    pub fn username_taken_errors() -> FormErrors {
        let mut errors = FormErrors::new();
        add_error(
            &mut errors,
            "username",
            "Пользователь с таким именем уже существует.",
        );
        errors
    }

    pub fn context(&self, errors: &FormErrors) -> Value {
        let field = |name: &str, label: &str, kind: &str, value: Value| {
            json!({
                "name": name, "kind": kind, "label": label, "value": value,
                "errors": errors.get(name).cloned().unwrap_or_default(),
            })
        };
        json!({
            "fields": {
                "first_name": field("first_name", "Имя", "char", json!(self.first_name)),
                "last_name": field("last_name", "Фамилия", "char", json!(self.last_name)),
                "username": field("username", "Имя пользователя", "char", json!(self.username)),
                "email": field("email", "Адрес электронной почты", "email", json!(self.email)),
                "password1": field("password1", "Пароль", "password", Value::Null),
                "password2": field("password2", "Подтверждение пароля", "password", Value::Null),
            },
            "errors": errors,
        })
    }
}
