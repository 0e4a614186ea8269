// ABOUTME: SQLite persistence layer for meals, meal items, media assets and canonicals
// ABOUTME: Owns the connection pool and idempotent schema migrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Database Management
//!
//! Persistence for the analysis core. The HTTP layer owns the wider schema;
//! this module creates and mutates only the tables the pipeline touches:
//! meals, meal items, media asset metadata and the canonical nutrient store.

mod assets;
mod canonical;
mod meals;

use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

/// Connection pool size for file-backed databases
const MAX_CONNECTIONS: u32 = 5;

/// Database manager for meal, asset and canonical storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open a connection pool. Does not run migrations; callers decide
    /// whether to [`migrate`](Self::migrate) based on configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory SQLite database is private to its connection, so the
        // pool is capped at one connection that is never recycled; otherwise
        // each pooled connection would see a different empty database
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any table or index creation fails
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_meals().await?;
        self.migrate_canonicals().await?;
        self.migrate_assets().await?;
        Ok(())
    }
}
