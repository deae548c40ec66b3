//! Integration tests against a real Vulkan device.
//!
//! Every test skips cleanly when no Vulkan implementation is available,
//! so the suite can run on headless CI without a GPU.

use rstest::rstest;
use vermilion_gpu::{
    BufferDescriptor, BufferUsage, CanvasDescriptor, ColorAttachment, Device, DeviceConfig,
    Extent3d, GpuError, LoadOp, Offset3d, PassDescriptor, StoreOp, TextureDescriptor,
    TextureFormat, TextureUsage,
};

fn create_device() -> Option<Device> {
    let _ = env_logger::builder().is_test(true).try_init();
    match Device::new(&DeviceConfig {
        app_name: "vermilion tests".to_string(),
        validation: true,
        display_handle: None,
    }) {
        Ok(device) => Some(device),
        Err(err) => {
            eprintln!("Skipping test, no usable Vulkan device: {err}");
            None
        }
    }
}

#[test]
fn test_device_reports_limits() {
    let Some(device) = create_device() else {
        return;
    };
    let limits = device.limits();
    assert!(limits.max_texture_size_2d >= 4096);
    assert!(limits.max_bundle_slots >= 4);
    assert!(limits.uniform_buffer_align.is_power_of_two());
}

#[test]
fn test_buffer_create_rejects_zero_size() {
    let Some(mut device) = create_device() else {
        return;
    };
    let result = device.create_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX));
    assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
}

#[rstest]
#[case(4)]
#[case(256)]
#[case(65_536)]
fn test_buffer_write_read_roundtrip(#[case] size: usize) {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(
            size as u64,
            BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        ))
        .unwrap();

    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    device.begin_frame().unwrap();
    device.write_buffer(buffer, 0, &data).unwrap();
    device.submit_frame().unwrap();

    let read = device.read_buffer(buffer, 0, size as u64).unwrap();
    assert_eq!(read, data);
}

#[test]
fn test_write_outside_frame_is_rejected() {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::COPY_DST))
        .unwrap();
    let result = device.write_buffer(buffer, 0, &[0u8; 16]);
    assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
}

#[test]
fn test_staging_pool_grows_for_large_upload() {
    let Some(mut device) = create_device() else {
        return;
    };
    // Larger than one standard scratchpad, so the pool must grow.
    let size: u64 = 16 * 1024 * 1024 + 4;
    let buffer = device
        .create_buffer(&BufferDescriptor::new(size, BufferUsage::COPY_DST))
        .unwrap();

    device.begin_frame().unwrap();
    device.write_buffer(buffer, 0, &[7u8; 16]).unwrap();
    let data = vec![42u8; size as usize - 16];
    device.write_buffer(buffer, 16, &data).unwrap();

    let stats = device.frame_stats();
    assert!(stats.scratchpads >= 2);
    assert!(stats.staged_bytes >= size);
    device.submit_frame().unwrap();
}

#[test]
fn test_staging_pool_is_retained_across_frames() {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(1024, BufferUsage::COPY_DST))
        .unwrap();

    device.begin_frame().unwrap();
    device.write_buffer(buffer, 0, &[1u8; 1024]).unwrap();
    device.submit_frame().unwrap();
    let grown = device.frame_stats().scratchpads;
    assert!(grown >= 1);

    for _ in 0..4 {
        device.begin_frame().unwrap();
        device.write_buffer(buffer, 0, &[2u8; 1024]).unwrap();
        device.submit_frame().unwrap();
    }
    // Small uploads reuse the existing scratchpads.
    assert_eq!(device.frame_stats().scratchpads, grown);
}

#[test]
fn test_destroyed_buffer_is_released_after_frames_retire() {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(256, BufferUsage::COPY_DST))
        .unwrap();

    device.begin_frame().unwrap();
    device.write_buffer(buffer, 0, &[9u8; 256]).unwrap();
    device.destroy_buffer(buffer).unwrap();
    assert!(device.frame_stats().condemned > 0);
    device.submit_frame().unwrap();

    // The handle is gone from the tables immediately.
    assert!(matches!(
        device.write_buffer(buffer, 0, &[0u8; 4]),
        Err(GpuError::InvalidParameter(_)) | Err(GpuError::InvalidHandle(_))
    ));

    // Cycling the ring brings the condemned slot back around and purges.
    for _ in 0..3 {
        device.begin_frame().unwrap();
        device.submit_frame().unwrap();
    }
    assert_eq!(device.frame_stats().condemned, 0);
}

#[test]
fn test_destroy_before_first_submit_is_immediate() {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::VERTEX))
        .unwrap();
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.frame_stats().condemned, 0);
    assert_eq!(device.live_resources(), 0);
}

#[test]
fn test_frames_in_flight_stay_bounded() {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(256, BufferUsage::COPY_DST))
        .unwrap();

    for i in 0..8u8 {
        device.begin_frame().unwrap();
        device.write_buffer(buffer, 0, &[i; 256]).unwrap();
        device.submit_frame().unwrap();
        assert!(device.frame_stats().in_flight <= 2);
    }
}

#[test]
fn test_texture_write_rejects_out_of_bounds_region() {
    let Some(mut device) = create_device() else {
        return;
    };
    let texture = device
        .create_texture(&TextureDescriptor {
            extent: Extent3d::new(4, 4),
            usage: TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();

    device.begin_frame().unwrap();
    // Data length matches the region, but the region hangs past the
    // 4x4 image.
    let data = vec![0u8; 4 * 4 * 4];
    let result = device.write_texture(
        texture,
        Offset3d {
            x: 3,
            y: 3,
            ..Default::default()
        },
        Extent3d::new(4, 4),
        0,
        &data,
    );
    assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
    device.submit_frame().unwrap();
}

#[test]
fn test_texture_write_region_checked_against_mip_extent() {
    let Some(mut device) = create_device() else {
        return;
    };
    let texture = device
        .create_texture(&TextureDescriptor {
            extent: Extent3d::new(8, 8),
            mip_count: 3,
            usage: TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();

    device.begin_frame().unwrap();
    // Mip 2 is 2x2; the full base extent no longer fits there.
    let full = vec![0u8; 8 * 8 * 4];
    let result = device.write_texture(texture, Offset3d::default(), Extent3d::new(8, 8), 2, &full);
    assert!(matches!(result, Err(GpuError::InvalidParameter(_))));

    let small = vec![0u8; 2 * 2 * 4];
    device
        .write_texture(texture, Offset3d::default(), Extent3d::new(2, 2), 2, &small)
        .unwrap();
    device.submit_frame().unwrap();
}

#[test]
fn test_transfers_inside_pass_are_rejected() {
    let Some(mut device) = create_device() else {
        return;
    };
    let target = device
        .create_texture(&TextureDescriptor {
            extent: Extent3d::new(4, 4),
            usage: TextureUsage::RENDER,
            ..Default::default()
        })
        .unwrap();
    let pass = device
        .create_pass(&PassDescriptor {
            colors: vec![ColorAttachment::default()],
            ..Default::default()
        })
        .unwrap();
    let canvas = device
        .create_canvas(&CanvasDescriptor {
            label: None,
            pass,
            colors: vec![target],
            depth: None,
        })
        .unwrap();
    let buffer = device
        .create_buffer(&BufferDescriptor::new(
            64,
            BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
        ))
        .unwrap();

    device.begin_frame().unwrap();
    device.begin_pass(canvas).unwrap();
    assert!(device.write_buffer(buffer, 0, &[1u8; 16]).is_err());
    assert!(device.copy_buffer(buffer, buffer, 0, 32, 16).is_err());
    assert!(device
        .set_layout(target, vermilion_gpu::TextureLayout::General)
        .is_err());
    device.end_pass().unwrap();

    // The same transfer is fine once the pass is closed.
    device.write_buffer(buffer, 0, &[1u8; 16]).unwrap();
    device.submit_frame().unwrap();
}

#[test]
fn test_buffer_ranges_reject_wrapping_offsets() {
    let Some(mut device) = create_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(
            64,
            BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
        ))
        .unwrap();

    device.begin_frame().unwrap();
    assert!(matches!(
        device.write_buffer(buffer, u64::MAX - 4, &[0u8; 16]),
        Err(GpuError::InvalidParameter(_))
    ));
    assert!(matches!(
        device.copy_buffer(buffer, buffer, u64::MAX - 4, 0, 16),
        Err(GpuError::InvalidParameter(_))
    ));
    device.submit_frame().unwrap();

    assert!(matches!(
        device.read_buffer(buffer, u64::MAX - 4, 16),
        Err(GpuError::InvalidParameter(_))
    ));
}

#[test]
fn test_texture_write_read_roundtrip() {
    let Some(mut device) = create_device() else {
        return;
    };
    let texture = device
        .create_texture(
            &TextureDescriptor {
                extent: Extent3d::new(4, 4),
                usage: TextureUsage::COPY_DST | TextureUsage::COPY_SRC,
                ..Default::default()
            }
            .with_label("roundtrip"),
        )
        .unwrap();

    let data: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
    device.begin_frame().unwrap();
    device
        .write_texture(texture, Offset3d::default(), Extent3d::new(4, 4), 0, &data)
        .unwrap();
    device.submit_frame().unwrap();

    let read = device.read_texture(texture).unwrap();
    assert_eq!(read, data);
}

#[test]
fn test_clear_pass_writes_clear_color() {
    let Some(mut device) = create_device() else {
        return;
    };
    let texture = device
        .create_texture(&TextureDescriptor {
            extent: Extent3d::new(8, 8),
            usage: TextureUsage::RENDER | TextureUsage::COPY_SRC,
            ..Default::default()
        })
        .unwrap();
    let pass = device
        .create_pass(&PassDescriptor {
            colors: vec![ColorAttachment {
                format: TextureFormat::Rgba8Unorm,
                load: LoadOp::Clear,
                store: StoreOp::Store,
                clear: [1.0, 0.0, 0.0, 1.0],
            }],
            ..Default::default()
        })
        .unwrap();
    let canvas = device
        .create_canvas(&CanvasDescriptor {
            label: None,
            pass,
            colors: vec![texture],
            depth: None,
        })
        .unwrap();

    device.begin_frame().unwrap();
    device.begin_pass(canvas).unwrap();
    device.end_pass().unwrap();
    device.submit_frame().unwrap();

    let pixels = device.read_texture(texture).unwrap();
    for texel in pixels.chunks_exact(4) {
        assert_eq!(texel, [255, 0, 0, 255]);
    }
}

#[test]
fn test_frame_completion_is_monotonic() {
    let Some(mut device) = create_device() else {
        return;
    };

    device.begin_frame().unwrap();
    let first = device.submit_frame().unwrap();
    assert_eq!(first, 1);

    device.wait_idle().unwrap();
    assert!(device.is_frame_complete(first).unwrap());
    // A frame that was never submitted is not complete.
    assert!(!device.is_frame_complete(first + 1).unwrap());

    device.begin_frame().unwrap();
    let second = device.submit_frame().unwrap();
    assert_eq!(second, first + 1);
    device.wait_idle().unwrap();
    assert!(device.is_frame_complete(first).unwrap());
    assert!(device.is_frame_complete(second).unwrap());
}

#[test]
fn test_double_begin_frame_is_rejected() {
    let Some(mut device) = create_device() else {
        return;
    };
    device.begin_frame().unwrap();
    assert!(device.begin_frame().is_err());
    device.submit_frame().unwrap();
}

#[test]
fn test_copy_buffer_moves_bytes() {
    let Some(mut device) = create_device() else {
        return;
    };
    let src = device
        .create_buffer(&BufferDescriptor::new(
            128,
            BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        ))
        .unwrap();
    let dst = device
        .create_buffer(&BufferDescriptor::new(
            128,
            BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        ))
        .unwrap();

    let data: Vec<u8> = (0..128).map(|i| i as u8 ^ 0x5a).collect();
    device.begin_frame().unwrap();
    device.write_buffer(src, 0, &data).unwrap();
    device.copy_buffer(src, dst, 0, 0, 128).unwrap();
    device.submit_frame().unwrap();

    let read = device.read_buffer(dst, 0, 128).unwrap();
    assert_eq!(read, data);
}

#[test]
fn test_resources_are_tracked_and_released() {
    let Some(mut device) = create_device() else {
        return;
    };
    assert_eq!(device.live_resources(), 0);

    let buffer = device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::UNIFORM))
        .unwrap();
    let texture = device
        .create_texture(&TextureDescriptor {
            extent: Extent3d::new(2, 2),
            usage: TextureUsage::SAMPLE | TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(device.live_resources(), 2);

    device.destroy_buffer(buffer).unwrap();
    device.destroy_texture(texture).unwrap();
    assert_eq!(device.live_resources(), 0);
}
