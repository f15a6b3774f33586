// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from Rust types defined in src/crd.rs.
//! This ensures the YAML files in deploy/crds/ are always in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use clusterward::crd::{ClusterDeployment, ClusterDeprovisionRequest, ClusterImageSet, DNSZone};
use kube::CustomResourceExt;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<ClusterDeployment>("clusterdeployments.crd.yaml", output_dir)?;
    generate_crd::<ClusterImageSet>("clusterimagesets.crd.yaml", output_dir)?;
    generate_crd::<DNSZone>("dnszones.crd.yaml", output_dir)?;
    generate_crd::<ClusterDeprovisionRequest>(
        "clusterdeprovisionrequests.crd.yaml",
        output_dir,
    )?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_crd_writes_header_and_definition() {
        let dir = tempfile::tempdir().unwrap();
        generate_crd::<ClusterDeployment>("clusterdeployments.crd.yaml", dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("clusterdeployments.crd.yaml")).unwrap();
        assert!(content.starts_with(COPYRIGHT_HEADER));
        assert!(content.contains("name: clusterdeployments.clusterward.firestoned.io"));
        assert!(content.contains("kind: CustomResourceDefinition"));
    }
}
