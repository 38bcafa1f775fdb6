#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use uuid::Uuid;

use hangar_core::installer::{Installer, InstallerSettings};
use hangar_core::platform::{
    ownership_target, CapabilitySet, OwnershipManager, OwnershipSpec, ServiceHostProbe,
    ServiceRegistrar, ServiceRegistrationDescriptor,
};
use hangar_core::progress::ProgressSink;
use hangar_core::retry::RetryPolicy;

pub const OWN_PROGRAM_NAME: &str = "hangar-deployer";

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub struct CleanupDir(pub PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().expect("parent"))
        .unwrap_or_else(|e| panic!("create parent for {} failed: {e}", path.display()));
    std::fs::write(path, content).unwrap_or_else(|e| panic!("write {} failed: {e}", path.display()));
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// 带 `FileVersion` 字符串条目的最小“主程序”字节。
pub fn program_bytes(version: &str) -> Vec<u8> {
    let mut bytes = b"MZ\0\0".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 0, 1, 0]);
    bytes.extend(utf16le("FileVersion\0"));
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes.extend(utf16le(version));
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

/// 在 `folder` 中写入程序归档：主程序 + 若干附加文件。
pub fn write_program_archive(
    folder: &Path,
    archive_file_name: &str,
    main_binary_file_name: &str,
    version: &str,
    extra_files: &[(&str, &str)],
) -> PathBuf {
    std::fs::create_dir_all(folder).expect("create archive folder");
    let path = folder.join(archive_file_name);
    let file = std::fs::File::create(&path).expect("create archive");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    zip.start_file(main_binary_file_name, options).expect("start main binary");
    zip.write_all(&program_bytes(version)).expect("write main binary");
    for (name, content) in extra_files {
        zip.start_file(*name, options).expect("start extra file");
        zip.write_all(content.as_bytes()).expect("write extra file");
    }
    zip.finish().expect("finish archive");
    path
}

pub fn settings_json(version: &str) -> String {
    format!(r#"{{ "Logging": {{ "LogLevel": {{ "Default": "Information" }} }}, "VersionInfo": {{ "AppSettingsVersion": "{version}" }} }}"#)
}

/// 伪造主机的可观察状态。
#[derive(Debug, Default)]
pub struct FakeHostState {
    /// 实际的服务注册信息（`None` 表示未注册）。
    pub registration: Option<ServiceRegistrationDescriptor>,
    pub running: bool,
    /// 是否仍有引用主程序的进程。
    pub process_running: bool,
    pub stop_fails: bool,
    /// 停止服务后进程依然存在。
    pub stop_leaves_process: bool,
    pub start_fails: bool,
    pub calls: Vec<String>,
    pub owned: Vec<PathBuf>,
}

/// 记录调用的伪造能力集合。
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    pub state: Arc<Mutex<FakeHostState>>,
}

impl FakeHost {
    pub fn with_running_service(descriptor: ServiceRegistrationDescriptor) -> Self {
        let host = Self::default();
        {
            let mut s = host.state.lock().unwrap();
            s.registration = Some(descriptor);
            s.running = true;
            s.process_running = true;
        }
        host
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn owned(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().owned.clone()
    }

    pub fn registration(&self) -> Option<ServiceRegistrationDescriptor> {
        self.state.lock().unwrap().registration.clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeHostState)) {
        f(&mut self.state.lock().unwrap());
    }
}

impl ServiceHostProbe for FakeHost {
    fn exists(&self, service_env_name: &str) -> bool {
        let s = self.state.lock().unwrap();
        s.registration
            .as_ref()
            .is_some_and(|r| r.service_env_name == service_env_name)
    }

    fn is_running(&self, service_env_name: &str) -> bool {
        self.exists(service_env_name) && self.state.lock().unwrap().running
    }

    fn is_process_running(&self, _main_binary: &Path) -> bool {
        self.state.lock().unwrap().process_running
    }
}

impl ServiceRegistrar for FakeHost {
    fn is_registered_properly(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<bool> {
        Ok(self.state.lock().unwrap().registration.as_ref() == Some(descriptor))
    }

    fn register(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("register".to_string());
        s.registration = Some(descriptor.clone());
        Ok(())
    }

    fn remove(&self, service_env_name: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("remove".to_string());
        if s.running {
            return Err(anyhow!("服务未停止，不能移除: {service_env_name}"));
        }
        s.registration = None;
        Ok(())
    }

    fn stop(&self, service_env_name: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("stop".to_string());
        if s.stop_fails {
            return Err(anyhow!("systemctl stop {service_env_name} 退出码 1"));
        }
        s.running = false;
        if !s.stop_leaves_process {
            s.process_running = false;
        }
        Ok(())
    }

    fn start(&self, service_env_name: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push("start".to_string());
        if s.start_fails {
            return Err(anyhow!("systemctl start {service_env_name} 退出码 1"));
        }
        s.running = true;
        Ok(())
    }
}

impl OwnershipManager for FakeHost {
    fn change_file_owner(&self, path: &Path, spec: &OwnershipSpec) -> Result<()> {
        if ownership_target(path, spec)?.is_some() {
            self.state.lock().unwrap().owned.push(path.to_path_buf());
        }
        Ok(())
    }

    fn change_folder_owner_recursive(&self, path: &Path, spec: &OwnershipSpec) -> Result<()> {
        self.change_file_owner(path, spec)
    }
}

impl CapabilitySet for FakeHost {
    type Probe = FakeHost;
    type Registrar = FakeHost;
    type Ownership = FakeHost;

    fn probe(&self) -> &Self::Probe {
        self
    }

    fn registrar(&self) -> &Self::Registrar {
        self
    }

    fn ownership(&self) -> &Self::Ownership {
        self
    }
}

/// 记录进度消息的接收方。
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl ProgressSink for RecordingProgress {
    fn message(&self, _text: &str) {}

    fn error(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }
}

/// 测试沙箱：`root/install`、`root/work`、`root/exchange`。
pub struct Sandbox {
    pub root: PathBuf,
    _cleanup: CleanupDir,
}

impl Sandbox {
    pub fn new(prefix: &str) -> Self {
        let root = unique_temp_dir(prefix);
        Self {
            _cleanup: CleanupDir(root.clone()),
            root,
        }
    }

    pub fn install_root(&self) -> PathBuf {
        self.root.join("install")
    }

    pub fn work(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn exchange(&self) -> PathBuf {
        self.root.join("exchange")
    }

    pub fn installer(&self, host: FakeHost) -> Installer<FakeHost> {
        Installer::new(
            InstallerSettings {
                install_root: self.install_root(),
                work_folder: self.work(),
                own_program_name: OWN_PROGRAM_NAME.to_string(),
                delete_retry: RetryPolicy::fixed(2, Duration::ZERO),
            },
            host,
        )
    }
}
