//! Desktop viewer: `glb-viewer [model.glb]`, or drop a file on the window.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use anyhow::Context as _;
    use clap::Parser;
    use glb_viewer::{
        config::{BuildConfig, CameraConfig, ViewerConfig},
        flow,
    };

    #[derive(Parser, Debug)]
    #[command(name = "glb-viewer", about = "Orbit around a binary glTF model", version)]
    struct Args {
        /// Model to show at startup
        model: Option<PathBuf>,

        /// Radians of orbit per dragged pixel
        #[arg(long)]
        rotate_sensitivity: Option<f32>,

        /// Zoom factor per scroll unit, must exceed 1
        #[arg(long)]
        zoom_base: Option<f32>,

        /// Deepest node hierarchy accepted when loading
        #[arg(long)]
        max_depth: Option<usize>,
    }

    impl Args {
        fn config(&self) -> ViewerConfig {
            let mut camera = CameraConfig::default();
            if let Some(sensitivity) = self.rotate_sensitivity {
                camera = camera.with_rotate_sensitivity(sensitivity);
            }
            if let Some(zoom_base) = self.zoom_base {
                camera = camera.with_zoom_base(zoom_base);
            }
            let mut build = BuildConfig::default();
            if let Some(max_depth) = self.max_depth {
                build = build.with_max_depth(max_depth);
            }
            ViewerConfig::default().with_camera(camera).with_build(build)
        }
    }

    pub fn main() -> anyhow::Result<()> {
        let args = Args::parse();
        let model = args
            .model
            .as_ref()
            .map(|path| std::fs::read(path).with_context(|| format!("reading {}", path.display())))
            .transpose()?;
        flow::run(args.config(), model)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}

// The browser build enters through the library's start hook.
#[cfg(target_arch = "wasm32")]
fn main() {}
