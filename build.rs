use std::cmp::Ordering;
use std::env;
use std::process::Command;

/// Cache line size assumed when the host cannot be probed.
const DEFAULT_CACHE_LINE: usize = 64;

// CPU features the kernels care about
#[derive(PartialEq, Eq, Debug)]
struct CpuFeature {
    name: &'static str,
    cfg_flag: &'static str,
    detected: bool,
}

impl CpuFeature {
    // Lowest number == highest priority
    fn priority(&self) -> usize {
        match self.name {
            "avx512f" => 0,
            "avx2" => 1,
            "sse4_1" => 2,
            "neon" => 3,
            _ => usize::MAX,
        }
    }

    fn features() -> Vec<CpuFeature> {
        vec![
            CpuFeature {
                name: "sse4_1",
                cfg_flag: "sse",
                detected: false,
            },
            CpuFeature {
                name: "avx512f",
                cfg_flag: "avx512",
                detected: false,
            },
            CpuFeature {
                name: "avx2",
                cfg_flag: "avx2",
                detected: false,
            },
            CpuFeature {
                name: "neon",
                cfg_flag: "neon",
                detected: false,
            },
        ]
    }
}

impl Ord for CpuFeature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for CpuFeature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

trait HostDetector {
    fn detect_features(&self, features: &mut [CpuFeature]);
    fn cache_line_size(&self) -> Option<usize>;
    fn is_applicable(&self) -> bool;
}

struct LinuxDetector;
impl HostDetector for LinuxDetector {
    fn detect_features(&self, features: &mut [CpuFeature]) {
        if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
            let contents = cpuinfo.to_lowercase();
            for feature in features.iter_mut() {
                // aarch64 kernels report NEON as "asimd"
                feature.detected = contents.contains(feature.name)
                    || (feature.name == "neon" && contents.contains("asimd"));
            }
        }
    }

    fn cache_line_size(&self) -> Option<usize> {
        std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cache/index0/coherency_line_size")
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    fn is_applicable(&self) -> bool {
        cfg!(target_os = "linux")
    }
}

struct MacOSDetector;
impl MacOSDetector {
    fn sysctl_all() -> Option<String> {
        let output = Command::new("sysctl").args(["-a"]).output().ok()?;
        Some(String::from_utf8_lossy(&output.stdout).to_lowercase())
    }
}

impl HostDetector for MacOSDetector {
    fn detect_features(&self, features: &mut [CpuFeature]) {
        if let Some(contents) = Self::sysctl_all() {
            for feature in features.iter_mut() {
                match feature.name {
                    "avx512f" => feature.detected = contents.contains("hw.optional.avx512f: 1"),
                    "avx2" => feature.detected = contents.contains("hw.optional.avx2_0: 1"),
                    "sse4_1" => feature.detected = contents.contains("hw.optional.sse4_1: 1"),
                    "neon" => feature.detected = contents.contains("hw.optional.neon: 1"),
                    _ => {}
                }
            }
        }
    }

    fn cache_line_size(&self) -> Option<usize> {
        let output = Command::new("sysctl")
            .args(["-n", "hw.cachelinesize"])
            .output()
            .ok()?;
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }

    fn is_applicable(&self) -> bool {
        cfg!(target_os = "macos")
    }
}

struct PlatformDetector;
impl PlatformDetector {
    fn detectors() -> Vec<Box<dyn HostDetector>> {
        vec![Box::new(LinuxDetector), Box::new(MacOSDetector)]
    }

    fn probe(features: &mut [CpuFeature]) -> Option<usize> {
        let detector = Self::detectors()
            .into_iter()
            .find(|detector| detector.is_applicable())?;
        detector.detect_features(features);
        detector.cache_line_size()
    }

    fn apply(features: &mut [CpuFeature], cache_line: usize) {
        features.sort();

        let cfg_flag = features
            .iter()
            .find(|cpu_feature| cpu_feature.detected)
            .map(|cpu_feature| cpu_feature.cfg_flag)
            .unwrap_or("fallback");

        println!("cargo:rustc-cfg={cfg_flag}");
        println!("cargo:rustc-env=NUMKERN_CACHE_LINE={cache_line}");

        println!("cargo::rustc-check-cfg=cfg(avx512)");
        println!("cargo::rustc-check-cfg=cfg(avx2)");
        println!("cargo::rustc-check-cfg=cfg(sse)");
        println!("cargo::rustc-check-cfg=cfg(neon)");
        println!("cargo::rustc-check-cfg=cfg(fallback)");
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let mut features = CpuFeature::features();

    // Only probe the host for native builds
    let host = env::var("HOST").unwrap_or_default();
    let target = env::var("TARGET").unwrap_or_default();

    let cache_line = if host == target {
        PlatformDetector::probe(&mut features)
    } else {
        None
    }
    .filter(|size| size.is_power_of_two())
    .unwrap_or(DEFAULT_CACHE_LINE);

    PlatformDetector::apply(&mut features, cache_line);
}
