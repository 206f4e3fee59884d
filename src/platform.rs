use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

pub fn get_system_info() -> PlatformInfo {
    let os = std::env::consts::OS.to_string();
    let arch = std::env::consts::ARCH.to_string();

    let normalized_arch = match arch.as_str() {
        "x86_64" => "x64".to_string(),
        "x86" => "x86".to_string(),
        "aarch64" => "arm64".to_string(),
        _ => arch,
    };

    PlatformInfo {
        os,
        arch: normalized_arch,
    }
}

/// Repository directory families that may be surfaced at all.
pub const SUPPORTED_OS_PREFIXES: &[&str] = &["mac", "linux", "windows"];

/// Raw repository directory name (without the trailing `/`) and its label.
const OS_LABELS: &[(&str, &str)] = &[
    ("linux_x64", "linux"),
    ("mac_x64", "mac"),
    ("windows_x86", "windows"),
];

pub fn is_supported_os_dir(dir: &str) -> bool {
    SUPPORTED_OS_PREFIXES
        .iter()
        .any(|prefix| dir.starts_with(prefix))
}

/// Friendly label for a repository OS directory. Unknown directories keep
/// their own name.
pub fn os_label(dir: &str) -> String {
    let raw = dir.trim_end_matches('/');
    OS_LABELS
        .iter()
        .find(|(d, _)| *d == raw)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Repository directory (with trailing `/`) for an OS label.
pub fn os_dir(label: &str) -> String {
    let raw = OS_LABELS
        .iter()
        .find(|(_, l)| *l == label)
        .map(|(d, _)| *d)
        .unwrap_or(label);
    format!("{}/", raw)
}

/// The label `auto` resolves to on this host.
pub fn host_os_label() -> String {
    match get_system_info().os.as_str() {
        "macos" => "mac".to_string(),
        other => other.to_string(),
    }
}

struct ArchRule {
    os: &'static str,
    toolchain_prefix: &'static str,
    arch: &'static str,
}

/// Which tool distribution a toolchain needs. First match wins; an empty
/// prefix matches every toolchain.
const ARCH_RULES: &[ArchRule] = &[
    ArchRule {
        os: "windows",
        toolchain_prefix: "win64_",
        arch: "x64",
    },
    ArchRule {
        os: "windows",
        toolchain_prefix: "win32_",
        arch: "x86",
    },
    ArchRule {
        os: "linux",
        toolchain_prefix: "",
        arch: "x64",
    },
];

pub fn required_tool_arch(os: &str, toolchain: &str) -> Option<&'static str> {
    ARCH_RULES
        .iter()
        .find(|rule| rule.os == os && toolchain.starts_with(rule.toolchain_prefix))
        .map(|rule| rule.arch)
}

/// Directory a toolchain is extracted into under `<output>/<version>/`.
pub fn toolchain_install_dir(toolchain: &str) -> String {
    if let Some(rest) = toolchain.strip_prefix("win64_mingw") {
        format!("mingw{}_64", rest)
    } else if let Some(rest) = toolchain.strip_prefix("win32_mingw") {
        format!("mingw{}_32", rest)
    } else if toolchain.starts_with("win") {
        toolchain
            .split_once('_')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_else(|| toolchain.to_string())
    } else {
        toolchain.to_string()
    }
}

/// How to get a working extraction tool on this host.
pub fn extraction_hint() -> &'static str {
    match get_system_info().os.as_str() {
        "linux" => "install p7zip with your package manager (e.g. `sudo apt install p7zip-full`) or set QTDL_ARCHIVE_TOOL",
        "macos" => "install p7zip with Homebrew (`brew install p7zip`) or set QTDL_ARCHIVE_TOOL",
        "windows" => "install 7-Zip from https://www.7-zip.org and add 7z.exe to PATH, or set QTDL_ARCHIVE_TOOL",
        _ => "install a 7z-compatible extraction tool and set QTDL_ARCHIVE_TOOL to its path",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_info() {
        let info = get_system_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
    }

    #[test]
    fn test_os_labels_are_bidirectional() {
        assert_eq!(os_label("linux_x64/"), "linux");
        assert_eq!(os_label("mac_x64/"), "mac");
        assert_eq!(os_label("windows_arm64/"), "windows_arm64");
        assert_eq!(os_dir("linux"), "linux_x64/");
        assert_eq!(os_dir("windows"), "windows_x86/");
        assert_eq!(os_dir("windows_arm64"), "windows_arm64/");
    }

    #[test]
    fn test_os_allow_list() {
        assert!(is_supported_os_dir("linux_x64/"));
        assert!(is_supported_os_dir("mac_x64/"));
        assert!(!is_supported_os_dir("all_os/"));
        assert!(!is_supported_os_dir("qnx/"));
    }

    #[test]
    fn test_arch_rules() {
        assert_eq!(required_tool_arch("windows", "win64_msvc2019_64"), Some("x64"));
        assert_eq!(required_tool_arch("windows", "win32_mingw81"), Some("x86"));
        assert_eq!(required_tool_arch("linux", "gcc_64"), Some("x64"));
        assert_eq!(required_tool_arch("mac", "clang_64"), None);
        assert_eq!(required_tool_arch("windows", "android_armv7"), None);
    }

    #[test]
    fn test_toolchain_install_dir() {
        assert_eq!(toolchain_install_dir("gcc_64"), "gcc_64");
        assert_eq!(toolchain_install_dir("win64_mingw81"), "mingw81_64");
        assert_eq!(toolchain_install_dir("win32_mingw73"), "mingw73_32");
        assert_eq!(toolchain_install_dir("win64_msvc2019_64"), "msvc2019_64");
        assert_eq!(toolchain_install_dir("android_armv7"), "android_armv7");
    }
}
