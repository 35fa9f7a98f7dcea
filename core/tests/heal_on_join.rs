//! End to end: a prompt becomes a plugin whose first draft does not compile,
//! and one repair round makes it build.

use async_trait::async_trait;
use forge_core::Forge;
use forge_core::ForgeConfig;
use forge_core::compiler::CompileMode;
use forge_core::compiler::CompileOutput;
use forge_core::compiler::Compiler;
use forge_core::extract::file_block;
use forge_core::normalize::MANIFEST_PATH;
use forge_core::normalize::manifest_value;
use forge_core::test_support::FnModel;
use pretty_assertions::assert_eq;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

const MAIN: &str = "src/main/java/com/pluginforge/healonjoin/HealOnJoin.java";

const BROKEN_MAIN: &str = r#"package com.example.healonjoin;

import org.bukkit.event.EventHandler;
import org.bukkit.event.Listener;
import org.bukkit.event.player.PlayerJoinEvent;
import org.bukkit.plugin.java.JavaPlugin;
import org.jetbrains.annotations.NotNull;

public class HealOnJoin extends JavaPlugin implements Listener {
    @Override
    public void onEnable() {
        getServer().getPluginManager().registerEvents(this, this);
    }

    @EventHandler
    public void onJoin(@NotNull PlayerJoinEvent event) {
        event.getPlayer().setHelth(event.getPlayer().getMaxHealth());
    }
}"#;

/// Fails with a javac-style error while any source still calls `setHelth`.
#[derive(Default)]
struct TypoCompiler {
    modes: Mutex<Vec<CompileMode>>,
}

#[async_trait]
impl Compiler for TypoCompiler {
    async fn compile(&self, dir: &Path, mode: CompileMode) -> io::Result<CompileOutput> {
        self.modes.lock().unwrap().push(mode);
        let source = tokio::fs::read_to_string(dir.join(MAIN)).await?;
        if source.contains("setHelth") {
            return Ok(CompileOutput {
                exit_code: Some(1),
                stdout: format!(
                    "[INFO] Compiling 1 source file\n[ERROR] {}:[17,26] cannot find symbol\n[ERROR]   symbol: method setHelth(double)\n[INFO] BUILD FAILURE\n",
                    dir.join(MAIN).display()
                ),
                stderr: String::new(),
                timed_out: false,
            });
        }
        let target = dir.join("target");
        tokio::fs::create_dir_all(&target).await?;
        tokio::fs::write(target.join("original-healonjoin-1.0.0.jar"), b"PK").await?;
        tokio::fs::write(target.join("healonjoin-1.0.0.jar"), b"PK").await?;
        Ok(CompileOutput {
            exit_code: Some(0),
            stdout: "[INFO] BUILD SUCCESS\n".to_string(),
            stderr: String::new(),
            timed_out: false,
        })
    }
}

fn respond(prompt: &str) -> Result<String, String> {
    if prompt.starts_with("You are planning") {
        Ok("- Heal every player to full health when they join.".to_string())
    } else if prompt.starts_with("You are designing") {
        Ok("Plugin Name: HealOnJoin\n- HealOnJoin: main class and join listener".to_string())
    } else if prompt.starts_with("List every file") {
        Ok(format!("```json\n[\"pom.xml\", \"src/main/resources/plugin.yml\", \"{MAIN}\"]\n```"))
    } else if prompt.starts_with("Write the complete") {
        Ok(format!(
            "Here is the project.\n{}{}",
            file_block(MAIN, BROKEN_MAIN),
            file_block(MANIFEST_PATH, "name: HealOnJoin\nmain: com.example.healonjoin.HealOnJoin\n"),
        ))
    } else if prompt.starts_with("The Maven build") {
        assert!(prompt.contains("setHelth"), "fix prompt should carry the failing source");
        let fixed = BROKEN_MAIN.replace("setHelth", "setHealth");
        Ok(file_block(MAIN, &fixed))
    } else {
        Ok("[]".to_string())
    }
}

#[tokio::test]
async fn heal_on_join_is_repaired_in_one_round() {
    let root = tempfile::tempdir().unwrap();
    let config = ForgeConfig {
        plugins_dir: root.path().to_path_buf(),
        ..ForgeConfig::default()
    };
    let compiler = Arc::new(TypoCompiler::default());
    let forge = Forge::new(&config, Arc::new(FnModel::new(respond)), compiler.clone());

    let outcome = forge
        .create("Make a plugin that heals players when they join", true, "heal-1")
        .await
        .unwrap();

    assert_eq!(outcome.plugin_name, "HealOnJoin");
    let build = outcome.build.expect("compiled");
    assert!(build.success, "{}", build.build_output);
    assert!(!build.degraded);
    assert_eq!(build.attempts_used, 2);
    assert_eq!(
        build.jar_path,
        Some(root.path().join("heal-1").join("target").join("healonjoin-1.0.0.jar"))
    );
    assert_eq!(
        *compiler.modes.lock().unwrap(),
        vec![CompileMode::Package, CompileMode::Package]
    );

    let main = outcome.tree.get(MAIN).unwrap();
    assert!(main.starts_with("package com.pluginforge.healonjoin;"));
    assert!(main.contains("setHealth(event.getPlayer().getAttribute(Attribute.GENERIC_MAX_HEALTH).getValue())"));
    assert!(!main.contains("NotNull"));
    assert_eq!(
        manifest_value(outcome.tree.get(MANIFEST_PATH).unwrap(), "main"),
        Some("com.pluginforge.healonjoin.HealOnJoin")
    );
    assert!(root.path().join("heal-1/pom.xml").is_file());

    let attempt = &build.attempts[0];
    assert_eq!(attempt.attempt_index, 1);
    assert!(attempt.files_sent.contains(MAIN));
    assert!(attempt.files_patched.contains(MAIN));
    assert!(attempt.compile_succeeded);
}
