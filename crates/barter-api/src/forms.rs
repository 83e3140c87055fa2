//! Input cleaning for the ad, proposal and signup forms.
//!
//! Field checks run first and collect every problem at once. Cross-field
//! rules run only once the fields they depend on are valid.

use uuid::Uuid;

use barter_db::AdFields;
use barter_types::api::{AdInput, ProposalInput, SignupRequest, ValidationErrors};
use barter_types::models::{Ad, Condition};
use barter_types::rules;

use crate::error::ApiError;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

const TITLE_MAX: usize = 200;
const CATEGORY_MAX: usize = 100;
const URL_MAX: usize = 200;
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

/// A validated ad, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanAd {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub condition: Condition,
}

impl CleanAd {
    pub fn fields(&self) -> AdFields<'_> {
        AdFields {
            title: &self.title,
            description: &self.description,
            image_url: self.image_url.as_deref(),
            category: &self.category,
            condition: self.condition.as_str(),
        }
    }
}

pub fn clean_ad(input: &AdInput) -> Result<CleanAd, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = required(&mut errors, "title", &input.title, Some(TITLE_MAX));
    let description = required(&mut errors, "description", &input.description, None);
    let category = required(&mut errors, "category", &input.category, Some(CATEGORY_MAX));

    let condition = match input.condition.trim() {
        "" => {
            errors.add_field("condition", REQUIRED);
            None
        }
        raw => match raw.parse::<Condition>() {
            Ok(c) => Some(c),
            Err(()) => {
                errors.add_field("condition", INVALID_CHOICE);
                None
            }
        },
    };

    let image_url = match clean_url(input.image_url.as_deref().unwrap_or_default()) {
        Ok(url) => url,
        Err(message) => {
            errors.add_field("image_url", message);
            None
        }
    };

    match (title, description, category, condition) {
        (Some(title), Some(description), Some(category), Some(condition)) if errors.is_empty() => {
            Ok(CleanAd {
                title,
                description,
                image_url,
                category,
                condition,
            })
        }
        _ => Err(errors),
    }
}

/// Optional http(s) URL. A value without a scheme is read as https.
fn clean_url(raw: &str) -> Result<Option<String>, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    if candidate.chars().count() > URL_MAX {
        return Err("Ensure this value has at most 200 characters.");
    }

    match url::Url::parse(&candidate) {
        Ok(url)
            if matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| h.contains('.') || h == "localhost") =>
        {
            Ok(Some(candidate))
        }
        _ => Err("Enter a valid URL."),
    }
}

/// Trimmed proposal input with both ads resolved.
#[derive(Debug, Clone)]
pub struct CleanProposal {
    pub ad_sender: Ad,
    pub ad_receiver: Ad,
    pub comment: String,
}

/// Validate a proposal submitted by `caller`.
///
/// `lookup` resolves an ad id; unknown ids are field errors. The exchange
/// rules run only when both ads resolved.
pub fn clean_proposal<F>(
    input: &ProposalInput,
    caller: Uuid,
    mut lookup: F,
) -> Result<CleanProposal, ApiError>
where
    F: FnMut(Uuid) -> anyhow::Result<Option<Ad>>,
{
    let mut errors = ValidationErrors::default();

    let ad_sender = resolve_ad(&mut errors, "ad_sender", input.ad_sender.as_deref(), &mut lookup)?;
    let ad_receiver =
        resolve_ad(&mut errors, "ad_receiver", input.ad_receiver.as_deref(), &mut lookup)?;
    let comment = required(&mut errors, "comment", &input.comment, None);

    if ad_sender.as_ref().is_some_and(|sender| sender.owner_id != caller) {
        errors.add_field("ad_sender", "You can only offer your own ads.");
    }

    if let (Some(sender), Some(receiver)) = (&ad_sender, &ad_receiver) {
        if let Err(violation) = rules::check_exchange(sender, receiver) {
            errors.add_form(violation.message());
        }
    }

    match (ad_sender, ad_receiver, comment) {
        (Some(ad_sender), Some(ad_receiver), Some(comment)) if errors.is_empty() => {
            Ok(CleanProposal {
                ad_sender,
                ad_receiver,
                comment,
            })
        }
        _ => Err(ApiError::Validation {
            message: "Error creating proposal.".to_string(),
            errors,
        }),
    }
}

fn resolve_ad<F>(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    lookup: &mut F,
) -> anyhow::Result<Option<Ad>>
where
    F: FnMut(Uuid) -> anyhow::Result<Option<Ad>>,
{
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        errors.add_field(field, REQUIRED);
        return Ok(None);
    }

    let found = match raw.parse::<Uuid>() {
        Ok(id) => lookup(id)?,
        Err(_) => None,
    };
    if found.is_none() {
        errors.add_field(field, INVALID_CHOICE);
    }
    Ok(found)
}

/// Field checks for registration. Username uniqueness needs the database and
/// is checked by the caller.
pub fn clean_signup(req: &SignupRequest) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    let username = req.username.trim();
    if username.is_empty() {
        errors.add_field("username", REQUIRED);
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add_field(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&username.chars().count()) {
        errors.add_field(
            "username",
            format!("Ensure this value has between {USERNAME_MIN} and {USERNAME_MAX} characters."),
        );
    }

    if req.password1.is_empty() {
        errors.add_field("password1", REQUIRED);
    } else {
        if req.password1.chars().count() < PASSWORD_MIN {
            errors.add_field(
                "password1",
                format!("This password is too short. It must contain at least {PASSWORD_MIN} characters."),
            );
        }
        if req.password1.chars().all(|c| c.is_ascii_digit()) {
            errors.add_field("password1", "This password is entirely numeric.");
        }
    }

    if req.password2.is_empty() {
        errors.add_field("password2", REQUIRED);
    } else if req.password1 != req.password2 {
        errors.add_field("password2", "The two password fields didn't match.");
    }

    errors
}

/// Trim a required text field and enforce an optional length limit.
fn required(
    errors: &mut ValidationErrors,
    field: &str,
    raw: &str,
    max_chars: Option<usize>,
) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add_field(field, REQUIRED);
        return None;
    }
    if let Some(max) = max_chars {
        if value.chars().count() > max {
            errors.add_field(field, format!("Ensure this value has at most {max} characters."));
            return None;
        }
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use barter_types::rules::ExchangeViolation;
    use chrono::Utc;

    fn ad_input(title: &str) -> AdInput {
        AdInput {
            title: title.into(),
            description: "D".into(),
            image_url: None,
            category: "Books".into(),
            condition: "new".into(),
        }
    }

    #[test]
    fn valid_ad_form() {
        let clean = clean_ad(&ad_input("T")).unwrap();
        assert_eq!(clean.title, "T");
        assert_eq!(clean.condition, Condition::New);
        assert_eq!(clean.image_url, None);
    }

    #[test]
    fn missing_title_is_a_title_error() {
        let errors = clean_ad(&ad_input("")).unwrap_err();
        assert!(errors.has_field("title"));
        assert_eq!(errors.fields.len(), 1);
    }

    #[test]
    fn empty_form_reports_every_required_field() {
        let errors = clean_ad(&AdInput::default()).unwrap_err();
        for field in ["title", "description", "category", "condition"] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
        assert!(!errors.has_field("image_url"));
    }

    #[test]
    fn unknown_condition_is_rejected() {
        let mut input = ad_input("T");
        input.condition = "broken".into();
        let errors = clean_ad(&input).unwrap_err();
        assert_eq!(errors.fields["condition"], [INVALID_CHOICE]);
    }

    #[test]
    fn image_url_without_scheme_assumes_https() {
        let mut input = ad_input("T");
        input.image_url = Some("example.com/cat.png".into());
        let clean = clean_ad(&input).unwrap();
        assert_eq!(clean.image_url.as_deref(), Some("https://example.com/cat.png"));
    }

    #[test]
    fn malformed_image_url_is_rejected() {
        for bad in ["not a url", "ftp://example.com/x", "https://"] {
            let mut input = ad_input("T");
            input.image_url = Some(bad.into());
            let errors = clean_ad(&input).unwrap_err();
            assert!(errors.has_field("image_url"), "{bad:?} accepted");
        }
    }

    #[test]
    fn blank_image_url_means_none() {
        let mut input = ad_input("T");
        input.image_url = Some("   ".into());
        assert_eq!(clean_ad(&input).unwrap().image_url, None);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let errors = clean_ad(&ad_input(&"x".repeat(201))).unwrap_err();
        assert!(errors.has_field("title"));
    }

    fn ad(owner_id: Uuid) -> Ad {
        Ad {
            id: Uuid::new_v4(),
            owner_id,
            owner_username: "owner".into(),
            title: "A".into(),
            description: "D".into(),
            image_url: None,
            category: "Books".into(),
            condition: Condition::New,
            created_at: Utc::now(),
        }
    }

    fn proposal_input(sender: &Ad, receiver: &Ad, comment: &str) -> ProposalInput {
        ProposalInput {
            ad_sender: Some(sender.id.to_string()),
            ad_receiver: Some(receiver.id.to_string()),
            comment: comment.into(),
        }
    }

    fn lookup_in(ads: Vec<Ad>) -> impl FnMut(Uuid) -> anyhow::Result<Option<Ad>> {
        move |id| Ok(ads.iter().find(|a| a.id == id).cloned())
    }

    fn validation_errors(result: Result<CleanProposal, ApiError>) -> ValidationErrors {
        match result {
            Err(ApiError::Validation { errors, .. }) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_proposal_form() {
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        let (a1, a2) = (ad(u1), ad(u2));
        let input = proposal_input(&a1, &a2, " Trade ");

        let clean = clean_proposal(&input, u1, lookup_in(vec![a1.clone(), a2.clone()])).unwrap();
        assert_eq!(clean.ad_sender.id, a1.id);
        assert_eq!(clean.ad_receiver.id, a2.id);
        assert_eq!(clean.comment, "Trade");
    }

    #[test]
    fn empty_proposal_form_reports_every_field() {
        let result = clean_proposal(&ProposalInput::default(), Uuid::new_v4(), lookup_in(vec![]));
        let errors = validation_errors(result);
        for field in ["ad_sender", "ad_receiver", "comment"] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
        assert!(errors.form.is_empty());
    }

    #[test]
    fn same_ad_is_a_form_error() {
        let u1 = Uuid::new_v4();
        let a1 = ad(u1);
        let input = proposal_input(&a1, &a1, "Invalid");

        let errors = validation_errors(clean_proposal(&input, u1, lookup_in(vec![a1.clone()])));
        assert_eq!(errors.form, [ExchangeViolation::SameAd.message()]);
        assert!(errors.fields.is_empty());
    }

    #[test]
    fn same_owner_is_a_form_error() {
        let u1 = Uuid::new_v4();
        let (a1, a3) = (ad(u1), ad(u1));
        let input = proposal_input(&a1, &a3, "Invalid");

        let errors =
            validation_errors(clean_proposal(&input, u1, lookup_in(vec![a1.clone(), a3.clone()])));
        assert_eq!(errors.form, [ExchangeViolation::SameOwner.message()]);
    }

    #[test]
    fn unknown_or_malformed_ids_are_field_errors() {
        let u1 = Uuid::new_v4();
        let a1 = ad(u1);
        let input = ProposalInput {
            ad_sender: Some(a1.id.to_string()),
            ad_receiver: Some("42".into()),
            comment: "hi".into(),
        };
        let errors = validation_errors(clean_proposal(&input, u1, lookup_in(vec![a1])));
        assert_eq!(errors.fields["ad_receiver"], [INVALID_CHOICE]);
        assert!(errors.form.is_empty());
    }

    #[test]
    fn sender_ad_must_belong_to_caller() {
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (a1, a2) = (ad(u1), ad(u2));
        let input = proposal_input(&a1, &a2, "hi");

        let errors =
            validation_errors(clean_proposal(&input, u3, lookup_in(vec![a1.clone(), a2.clone()])));
        assert!(errors.has_field("ad_sender"));
    }

    #[test]
    fn lookup_failure_is_internal() {
        let input = ProposalInput {
            ad_sender: Some(Uuid::new_v4().to_string()),
            ad_receiver: Some(Uuid::new_v4().to_string()),
            comment: "hi".into(),
        };
        let result = clean_proposal(&input, Uuid::new_v4(), |_| Err(anyhow::anyhow!("db down")));
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    fn signup(username: &str, p1: &str, p2: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            password1: p1.into(),
            password2: p2.into(),
        }
    }

    #[test]
    fn valid_signup() {
        assert!(clean_signup(&signup("newuser", "Aa12345678!", "Aa12345678!")).is_empty());
    }

    #[test]
    fn signup_rejects_weak_or_mismatched_passwords() {
        let errors = clean_signup(&signup("newuser", "1234567", "7654321"));
        assert_eq!(errors.fields["password1"].len(), 2);
        assert!(errors.has_field("password2"));
    }

    #[test]
    fn signup_rejects_odd_usernames() {
        assert!(clean_signup(&signup("a b", "Aa12345678!", "Aa12345678!")).has_field("username"));
        assert!(clean_signup(&signup("ab", "Aa12345678!", "Aa12345678!")).has_field("username"));
        assert!(clean_signup(&signup("", "Aa12345678!", "Aa12345678!")).has_field("username"));
    }
}
