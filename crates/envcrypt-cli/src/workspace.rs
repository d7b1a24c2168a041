//! Local JSON records under `store.data_dir`
//!
//! Layout:
//!
//! ```text
//! <data_dir>/identity.json          this user's UserIdentity
//! <data_dir>/project.json           project metadata and one grant per member
//! <data_dir>/history/<env>.json     MemoryVersionStore for one environment
//! ```

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use envcrypt_core::encoding;
use envcrypt_crypto::{PublicKey, UserIdentity, WrappedKeyRecord};
use envcrypt_env::MemoryVersionStore;

/// The shareable half of an identity: enough to grant access, nothing secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "encoding::array")]
    pub public_key: [u8; 32],
}

impl PublicIdentity {
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.public_key)
    }
}

impl From<&UserIdentity> for PublicIdentity {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            public_key: identity.public_key,
        }
    }
}

/// One member's wrapped copy of the project key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: Uuid,
    pub email: String,
    #[serde(flatten)]
    pub record: WrappedKeyRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub project_id: Uuid,
    pub project_name: String,
    pub owner_id: Uuid,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl ProjectFile {
    pub fn grant_for(&self, user_id: Uuid) -> Option<&Grant> {
        self.grants.iter().find(|g| g.user_id == user_id)
    }

    /// Add or replace the grant for `grant.user_id`.
    pub fn upsert_grant(&mut self, grant: Grant) {
        match self.grants.iter_mut().find(|g| g.user_id == grant.user_id) {
            Some(existing) => *existing = grant,
            None => self.grants.push(grant),
        }
    }

    /// Drop the grant for `email`. The owner's grant cannot be removed.
    pub fn revoke(&mut self, email: &str) -> Result<Grant> {
        let idx = self
            .grants
            .iter()
            .position(|g| g.email == email)
            .with_context(|| format!("no grant for {email}"))?;
        if self.grants[idx].user_id == self.owner_id {
            anyhow::bail!("cannot revoke the project owner");
        }
        Ok(self.grants.remove(idx))
    }
}

pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identity_path(&self) -> PathBuf {
        self.root.join("identity.json")
    }

    fn project_path(&self) -> PathBuf {
        self.root.join("project.json")
    }

    fn history_path(&self, env_name: &str) -> Result<PathBuf> {
        validate_env_name(env_name)?;
        Ok(self.root.join("history").join(format!("{env_name}.json")))
    }

    pub fn has_identity(&self) -> bool {
        self.identity_path().exists()
    }

    pub fn load_identity(&self) -> Result<UserIdentity> {
        read_json(&self.identity_path())
            .context("no usable identity; run `envcrypt identity new` first")
    }

    pub fn save_identity(&self, identity: &UserIdentity) -> Result<()> {
        write_json(&self.identity_path(), identity)
    }

    pub fn has_project(&self) -> bool {
        self.project_path().exists()
    }

    pub fn load_project(&self) -> Result<ProjectFile> {
        read_json(&self.project_path()).context("no usable project; run `envcrypt project new` first")
    }

    pub fn save_project(&self, project: &ProjectFile) -> Result<()> {
        write_json(&self.project_path(), project)
    }

    /// Load the history for `env_name`, or start an empty one.
    pub fn load_history(&self, project: &ProjectFile, env_name: &str) -> Result<MemoryVersionStore> {
        let path = self.history_path(env_name)?;
        if !path.exists() {
            return Ok(MemoryVersionStore::new(project.project_id, env_name));
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading history: {}", path.display()))?;
        let store = MemoryVersionStore::from_json(&json)
            .with_context(|| format!("parsing history: {}", path.display()))?;
        if store.project_id != project.project_id {
            anyhow::bail!(
                "history {} belongs to project {}, not {}",
                path.display(),
                store.project_id,
                project.project_id
            );
        }
        Ok(store)
    }

    pub fn save_history(&self, store: &MemoryVersionStore) -> Result<()> {
        let path = self.history_path(&store.env_name)?;
        let json = store.to_json().context("serializing history")?;
        write_atomic(&path, &json)
    }
}

/// Environment names become file names, so only `[A-Za-z0-9_.-]` is allowed
/// and `.`/`..` are refused.
pub fn validate_env_name(env_name: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if env_name.is_empty() || env_name == "." || env_name == ".." || !env_name.chars().all(allowed) {
        anyhow::bail!("invalid environment name {env_name:?}: use letters, digits, '_', '-' or '.'");
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    write_atomic(path, &json)
}

/// Write then rename, so a crash never leaves a half-written record.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)
        .with_context(|| format!("writing temp file: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming into place: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envcrypt_crypto::{generate_pmk, wrap_for_recipient, KdfParams, KeyPair};
    use secrecy::SecretString;

    fn fast_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            mem_cost_kib: 1024,
            parallelism: 1,
            key_length: 32,
        }
    }

    fn grant_for(email: &str, user_id: Uuid) -> Grant {
        let pmk = generate_pmk().unwrap();
        let kp = KeyPair::generate().unwrap();
        Grant {
            user_id,
            email: email.to_string(),
            record: wrap_for_recipient(&pmk, kp.public()).unwrap(),
        }
    }

    fn project() -> ProjectFile {
        let owner = Uuid::new_v4();
        ProjectFile {
            project_id: Uuid::new_v4(),
            project_name: "api".into(),
            owner_id: owner,
            grants: vec![grant_for("owner@example.com", owner)],
        }
    }

    #[test]
    fn identity_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert!(!ws.has_identity());
        assert!(ws.load_identity().is_err());

        let (identity, _) =
            UserIdentity::create("a@b.c", &SecretString::from("pw".to_string()), &fast_params()).unwrap();
        ws.save_identity(&identity).unwrap();

        assert!(ws.has_identity());
        assert_eq!(ws.load_identity().unwrap(), identity);
    }

    #[test]
    fn public_identity_reads_full_record() {
        let (identity, _) =
            UserIdentity::create("a@b.c", &SecretString::from("pw".to_string()), &fast_params()).unwrap();
        let json = serde_json::to_string(&identity).unwrap();

        let public: PublicIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(public, PublicIdentity::from(&identity));
        assert_eq!(public.public_key(), identity.public_key());
    }

    #[test]
    fn project_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("nested"));
        let p = project();

        ws.save_project(&p).unwrap();
        assert_eq!(ws.load_project().unwrap(), p);
    }

    #[test]
    fn upsert_replaces_existing_grant() {
        let mut p = project();
        let bob = Uuid::new_v4();
        p.upsert_grant(grant_for("bob@example.com", bob));
        let replacement = grant_for("bob@example.com", bob);
        p.upsert_grant(replacement.clone());

        assert_eq!(p.grants.len(), 2);
        assert_eq!(p.grant_for(bob), Some(&replacement));
    }

    #[test]
    fn revoke_rules() {
        let mut p = project();
        p.upsert_grant(grant_for("bob@example.com", Uuid::new_v4()));

        assert!(p.revoke("owner@example.com").is_err());
        assert!(p.revoke("nobody@example.com").is_err());
        assert_eq!(p.revoke("bob@example.com").unwrap().email, "bob@example.com");
        assert_eq!(p.grants.len(), 1);
    }

    #[test]
    fn revoke_removes_access_and_keeps_owner() {
        let pmk = generate_pmk().unwrap();
        let owner = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let (owner_id, bob_id) = (Uuid::new_v4(), Uuid::new_v4());

        let mut p = ProjectFile {
            project_id: Uuid::new_v4(),
            project_name: "api".into(),
            owner_id,
            grants: vec![Grant {
                user_id: owner_id,
                email: "owner@example.com".into(),
                record: wrap_for_recipient(&pmk, owner.public()).unwrap(),
            }],
        };
        let owner_grant = p.grants[0].clone();
        let bob_record = envcrypt_crypto::grant(&owner_grant.record, owner.secret(), bob.public()).unwrap();
        p.upsert_grant(Grant {
            user_id: bob_id,
            email: "bob@example.com".into(),
            record: bob_record,
        });
        assert!(p.grant_for(bob_id).is_some());

        let revoked = p.revoke("bob@example.com").unwrap();
        assert_eq!(revoked.user_id, bob_id);
        assert!(p.grant_for(bob_id).is_none());
        assert_eq!(p.grant_for(owner_id), Some(&owner_grant));

        // No remaining record opens for bob; the owner's still does
        for g in &p.grants {
            assert!(envcrypt_crypto::unwrap(&g.record, bob.secret()).unwrap_err().is_authentication());
        }
        let recovered = envcrypt_crypto::unwrap(&owner_grant.record, owner.secret()).unwrap();
        assert_eq!(recovered.as_bytes(), pmk.as_bytes());
    }

    #[test]
    fn history_missing_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let p = project();

        let store = ws.load_history(&p, "dev").unwrap();
        assert_eq!(store.env_name, "dev");
        assert_eq!(store.project_id, p.project_id);

        ws.save_history(&store).unwrap();
        assert_eq!(ws.load_history(&p, "dev").unwrap(), store);
    }

    #[test]
    fn history_from_other_project_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let other = MemoryVersionStore::new(Uuid::new_v4(), "dev");
        ws.save_history(&other).unwrap();

        assert!(ws.load_history(&project(), "dev").is_err());
    }

    #[test]
    fn env_name_cannot_leave_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("a").join("b");
        let ws = Workspace::new(&data_dir);
        let p = project();

        for name in ["../../escaped", "..", ".", "", "x/y", "x\\y", "nul\0"] {
            let store = MemoryVersionStore::new(p.project_id, name);
            assert!(ws.save_history(&store).is_err(), "{name:?} accepted");
            assert!(ws.load_history(&p, name).is_err(), "{name:?} accepted");
        }
        assert!(!dir.path().join("escaped.json").exists());
        assert!(!dir.path().join("a").join("escaped.json").exists());
        assert!(!data_dir.exists());
    }

    #[test]
    fn env_name_allow_list() {
        for name in ["dev", "production", "eu-west_1", "v1.2"] {
            assert!(validate_env_name(name).is_ok(), "{name:?} rejected");
        }
    }
}
