use anyhow::Context;
use std::sync::Arc;

use bookcat_db::Db;

use crate::module::{InitCtx, Migration, Module};

/// Module registry for managing module lifecycle.
///
/// Modules are kept in registration order; that order drives migrations,
/// initialization and startup, and is reversed on shutdown.
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module with the registry
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Get all registered modules
    pub fn modules(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter()
    }

    /// Get a module by name
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.name() == name)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Initialize modules in registration order
    pub async fn init_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing {} modules", self.modules.len());

        for module in &self.modules {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Start modules in registration order
    pub async fn start_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in &self.modules {
            tracing::info!(module = module.name(), "starting module");

            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop modules in reverse registration order
    pub async fn stop_modules(&self) -> anyhow::Result<()> {
        tracing::info!("stopping {} modules", self.modules.len());

        for module in self.modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping module");

            module
                .stop()
                .await
                .with_context(|| format!("failed to stop module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all migrations from all modules.
    ///
    /// Ordered by migration id; modules sharing an id keep registration order,
    /// so a module registered after the tables it references runs after them.
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations = Vec::new();

        for module in &self.modules {
            for migration in module.migrations() {
                migrations.push((module.name().to_string(), migration));
            }
        }

        migrations.sort_by(|a, b| a.1.id.cmp(b.1.id));

        migrations
    }

    /// Apply every pending migration. Returns how many ran.
    pub async fn run_migrations(&self, db: &Db) -> anyhow::Result<usize> {
        let mut applied = 0;
        for (module, migration) in self.collect_migrations() {
            if db
                .apply_migration(&module, migration.id, migration.up)
                .await?
            {
                applied += 1;
            }
        }

        tracing::info!(applied, "migrations complete");
        Ok(applied)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    struct TestModule {
        name: &'static str,
        migrations: Vec<Migration>,
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn migrations(&self) -> Vec<Migration> {
            self.migrations.clone()
        }
    }

    fn shelf_module() -> Arc<dyn Module> {
        Arc::new(TestModule {
            name: "shelves",
            migrations: vec![Migration {
                id: "001_init",
                up: "CREATE TABLE shelf (id INTEGER PRIMARY KEY);",
            }],
        })
    }

    fn slot_module() -> Arc<dyn Module> {
        Arc::new(TestModule {
            name: "archive",
            migrations: vec![
                Migration {
                    id: "002_slot_label",
                    up: "ALTER TABLE slot ADD COLUMN label TEXT;",
                },
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE slot (id INTEGER PRIMARY KEY, shelf_id INTEGER NOT NULL REFERENCES shelf(id));",
                },
            ],
        })
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.module_count(), 0);
        assert!(registry.collect_migrations().is_empty());
    }

    #[test]
    fn migrations_follow_id_then_registration_order() {
        let mut registry = ModuleRegistry::new();
        registry.register(shelf_module());
        registry.register(slot_module());

        let order: Vec<(String, &str)> = registry
            .collect_migrations()
            .into_iter()
            .map(|(module, m)| (module, m.id))
            .collect();

        assert_eq!(
            order,
            vec![
                ("shelves".to_string(), "001_init"),
                ("archive".to_string(), "001_init"),
                ("archive".to_string(), "002_slot_label"),
            ]
        );
    }

    #[tokio::test]
    async fn test_module_lifecycle() {
        let mut registry = ModuleRegistry::new();
        registry.register(shelf_module());
        registry.register(slot_module());
        assert!(registry.get_module("archive").is_some());

        let settings = Settings::default();
        let db = Db::in_memory().await.unwrap();
        let ctx = InitCtx {
            settings: &settings,
            db: &db,
        };

        assert_eq!(registry.run_migrations(&db).await.unwrap(), 3);
        assert_eq!(registry.run_migrations(&db).await.unwrap(), 0);

        registry.init_modules(&ctx).await.unwrap();
        registry.start_modules(&ctx).await.unwrap();
        registry.stop_modules().await.unwrap();
    }
}
