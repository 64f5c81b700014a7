use anyhow::{anyhow, Context, Result};
use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub host: String,
    pub local_path: String,
}

pub struct ProfileManager;

impl ProfileManager {
    pub fn new() -> Self {
        Self
    }

    fn profiles_path() -> Result<std::path::PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "caravel", "caravel")
            .ok_or_else(|| anyhow!("cannot determine config dir"))?;
        let path = proj_dirs.config_dir().join("profiles.json");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {parent:?} failed"))?;
        }
        Ok(path)
    }

    pub fn list(&self) -> Result<Vec<Profile>> {
        let path = Self::profiles_path()?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("read profiles {path:?} failed"))?;
        serde_json::from_str(&data).with_context(|| format!("parse profiles {path:?} failed"))
    }

    pub fn find(&self, name_or_id: &str) -> Result<Profile> {
        self.list()?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name_or_id) || p.id == name_or_id)
            .ok_or_else(|| anyhow!("Profile '{}' not found", name_or_id))
    }

    pub fn add(
        &self,
        id: String,
        name: String,
        host: String,
        local_path: Utf8PathBuf,
    ) -> Result<Profile> {
        let mut profiles = self.list()?;

        if id.trim().is_empty() {
            return Err(anyhow!("Profile ID cannot be empty"));
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow!("Profile ID must use only a-z, 0-9, - and _"));
        }
        if profiles.iter().any(|p| p.id == id) {
            return Err(anyhow!("A profile with ID '{}' already exists", id));
        }

        let profile = Profile {
            id,
            name,
            host,
            local_path: local_path.to_string(),
        };

        profiles.push(profile.clone());
        self.save(&profiles)?;
        Ok(profile)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut profiles = self.list()?;
        let original_len = profiles.len();
        profiles.retain(|p| p.id != name && !p.name.eq_ignore_ascii_case(name));

        if profiles.len() == original_len {
            return Err(anyhow!("Profile '{}' not found", name));
        }

        self.save(&profiles)
    }

    fn save(&self, profiles: &[Profile]) -> Result<()> {
        let path = Self::profiles_path()?;
        let tmp = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(profiles)?;
        std::fs::write(&tmp, data).with_context(|| format!("write {tmp:?} failed"))?;
        std::fs::rename(&tmp, &path).with_context(|| format!("rename {tmp:?} failed"))?;
        Ok(())
    }
}

impl Default for ProfileManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn handle_list() -> Result<()> {
    let mgr = ProfileManager::new();
    let profiles = mgr.list()?;

    if profiles.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }

    println!("{:<20} {:<24} {:<32} {:<32}", "ID", "NAME", "HOST", "PATH");
    println!("{:-<20} {:-<24} {:-<32} {:-<32}", "", "", "", "");
    for p in profiles {
        println!(
            "{:<20} {:<24} {:<32} {:<32}",
            p.id, p.name, p.host, p.local_path
        );
    }

    Ok(())
}

pub fn handle_add(id: String, name: String, host: String, path: Utf8PathBuf) -> Result<()> {
    let mgr = ProfileManager::new();
    let p = mgr.add(id, name, host, path)?;
    println!("Profile '{}' ({}) created successfully.", p.name, p.id);
    Ok(())
}

pub fn handle_remove(name: String) -> Result<()> {
    let mgr = ProfileManager::new();
    mgr.remove(&name)?;
    println!("Profile '{}' removed.", name);
    Ok(())
}
