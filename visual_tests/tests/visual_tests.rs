use std::rc::Rc;

use tessera::renderer::SoftwareDevice;
use visual_tests::{render_scene, run_parity_test, ParityTestConfig, SCENES};

/// Helper macro to generate parity test functions
macro_rules! parity_test {
    ($name:ident, $scene:literal) => {
        #[test]
        fn $name() {
            let _ = env_logger::builder().is_test(true).try_init();

            let Some(result) = run_parity_test(&ParityTestConfig {
                scene: $scene.to_string(),
                ..Default::default()
            })
            .expect("Parity test failed to run") else {
                eprintln!("No GPU adapter, skipping '{}'", $scene);
                return;
            };

            assert!(
                result.passed,
                "Backends disagree on '{}': similarity {:.4}% (max channel difference {})\n\
                 Reference: {}\n\
                 GPU:       {}\n\
                 Diff:      {}",
                $scene,
                result.similarity * 100.0,
                result.max_difference,
                result.reference_path.display(),
                result.gpu_path.display(),
                result
                    .diff_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "N/A".to_string())
            );
        }
    };
}

parity_test!(test_shapes, "shapes");
parity_test!(test_nested_clip, "nested_clip");
parity_test!(test_text, "text");
parity_test!(test_widgets, "widgets");

#[test]
fn test_every_scene_renders_on_cpu() {
    for scene in SCENES {
        let image = render_scene(scene, Rc::new(SoftwareDevice::new(1, 1)))
            .unwrap_or_else(|e| panic!("{scene}: {e}"));
        assert!(image.width() > 0 && image.height() > 0);
        // Every scene clears to white before drawing.
        assert_eq!(image.get_pixel(0, 0).0[3], 255);
    }
}

#[test]
fn test_unknown_scene_is_an_error() {
    assert!(render_scene("missing", Rc::new(SoftwareDevice::new(1, 1))).is_err());
}
