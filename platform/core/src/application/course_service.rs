// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::course::{Course, CourseError, CourseId};
use crate::domain::repository::{CourseRepository, RepositoryError};
use crate::domain::user::UserId;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Error)]
pub enum CourseServiceError {
    #[error("Course not found")]
    NotFound(CourseId),

    #[error(transparent)]
    Course(#[from] CourseError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait CourseService: Send + Sync {
    async fn create_course(
        &self,
        instructor_id: UserId,
        request: CreateCourseRequest,
    ) -> Result<Course, CourseServiceError>;

    async fn list_courses(&self, published_only: bool) -> Result<Vec<Course>, CourseServiceError>;

    async fn get_course(&self, id: CourseId) -> Result<Course, CourseServiceError>;

    async fn publish_course(&self, id: CourseId, instructor_id: UserId) -> Result<Course, CourseServiceError>;
}

pub struct StandardCourseService {
    repository: Arc<dyn CourseRepository>,
}

impl StandardCourseService {
    pub fn new(repository: Arc<dyn CourseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CourseService for StandardCourseService {
    async fn create_course(
        &self,
        instructor_id: UserId,
        request: CreateCourseRequest,
    ) -> Result<Course, CourseServiceError> {
        let course = Course::new(request.title, instructor_id, request.price_cents, request.currency)?;
        self.repository.save(&course).await?;
        info!(course_id = %course.id, slug = %course.slug, "Course created");
        Ok(course)
    }

    async fn list_courses(&self, published_only: bool) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.repository.list(published_only).await?)
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, CourseServiceError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(CourseServiceError::NotFound(id))
    }

    async fn publish_course(&self, id: CourseId, instructor_id: UserId) -> Result<Course, CourseServiceError> {
        let mut course = self.get_course(id).await?;
        course.publish(instructor_id)?;
        self.repository.save(&course).await?;
        info!(course_id = %course.id, "Course published");
        Ok(course)
    }
}
