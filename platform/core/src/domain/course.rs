// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Course Aggregate
//!
//! Catalog entry a user can buy or enroll in. Only the pieces of the catalog
//! that the payment and enrollment workflows depend on live here: identity,
//! ownership, publication status and price resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub Uuid);

impl CourseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CourseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// A resolved, chargeable amount in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub slug: String,
    pub instructor_id: UserId,
    pub price_cents: Option<i64>,
    pub currency: String,
    pub is_free: bool,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CourseError {
    #[error("Invalid course: {0}")]
    Invalid(String),

    #[error("Course price could not be resolved")]
    PriceUnavailable,

    #[error("Course is free; enroll directly instead of paying")]
    FreeCourse,

    #[error("Course is not free; a payment is required")]
    PaymentRequired,

    #[error("Course is not available for enrollment")]
    NotPublished,

    #[error("Only the course instructor can perform this action")]
    NotInstructor,
}

impl Course {
    pub fn new(
        title: String,
        instructor_id: UserId,
        price_cents: Option<i64>,
        currency: Option<String>,
    ) -> Result<Self, CourseError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(CourseError::Invalid("title cannot be empty".to_string()));
        }
        if let Some(price) = price_cents {
            if price < 0 {
                return Err(CourseError::Invalid("price cannot be negative".to_string()));
            }
        }

        let currency = currency
            .map(|c| c.trim().to_lowercase())
            .unwrap_or_else(|| "usd".to_string());
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CourseError::Invalid(format!("unsupported currency code '{}'", currency)));
        }

        Ok(Self {
            id: CourseId::new(),
            slug: slugify(&title),
            title,
            instructor_id,
            is_free: matches!(price_cents, None | Some(0)),
            price_cents,
            currency,
            status: CourseStatus::Draft,
            created_at: Utc::now(),
        })
    }

    /// Resolve the amount to charge for this course.
    pub fn resolve_price(&self) -> Result<Price, CourseError> {
        if self.is_free {
            return Err(CourseError::FreeCourse);
        }
        match self.price_cents {
            Some(amount) if amount > 0 => Ok(Price {
                amount_cents: amount,
                currency: self.currency.clone(),
            }),
            _ => Err(CourseError::PriceUnavailable),
        }
    }

    pub fn ensure_enrollable(&self) -> Result<(), CourseError> {
        if self.status != CourseStatus::Published {
            return Err(CourseError::NotPublished);
        }
        Ok(())
    }

    pub fn publish(&mut self, by: UserId) -> Result<(), CourseError> {
        if by != self.instructor_id {
            return Err(CourseError::NotInstructor);
        }
        self.status = CourseStatus::Published;
        Ok(())
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_course_resolves_price() {
        let course = Course::new("Rust 101".into(), UserId::new(), Some(4900), Some("EUR".into())).unwrap();
        assert!(!course.is_free);
        assert_eq!(course.slug, "rust-101");
        let price = course.resolve_price().unwrap();
        assert_eq!(price.amount_cents, 4900);
        assert_eq!(price.currency, "eur");
    }

    #[test]
    fn test_free_course_has_no_price() {
        let course = Course::new("Intro".into(), UserId::new(), None, None).unwrap();
        assert!(course.is_free);
        assert_eq!(course.resolve_price(), Err(CourseError::FreeCourse));
    }

    #[test]
    fn test_missing_price_on_paid_course_is_unavailable() {
        let mut course = Course::new("Advanced".into(), UserId::new(), Some(1000), None).unwrap();
        course.price_cents = None;
        assert_eq!(course.resolve_price(), Err(CourseError::PriceUnavailable));
    }

    #[test]
    fn test_publish_requires_instructor() {
        let instructor = UserId::new();
        let mut course = Course::new("Systems".into(), instructor, Some(100), None).unwrap();
        assert_eq!(course.ensure_enrollable(), Err(CourseError::NotPublished));
        assert_eq!(course.publish(UserId::new()), Err(CourseError::NotInstructor));
        course.publish(instructor).unwrap();
        assert!(course.ensure_enrollable().is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Course::new("   ".into(), UserId::new(), None, None).is_err());
        assert!(Course::new("x".into(), UserId::new(), Some(-1), None).is_err());
        assert!(Course::new("x".into(), UserId::new(), Some(1), Some("euro".into())).is_err());
    }
}
