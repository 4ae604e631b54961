// Unit tests for domain models

#[cfg(test)]
mod tests {
    use crate::domain::model::*;
    use crate::error::EncodeError;
    use std::path::Path;

    #[test]
    fn test_frame_validate_rejects_short_buffer() {
        let frame = Frame::from_u8(4, 4, 3, vec![0; 47]);
        assert!(matches!(frame.validate(), Err(EncodeError::InvalidFrame { .. })));

        let frame = Frame::from_u8(4, 4, 3, vec![0; 48]);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_frame_float_conversion_truncates_and_clamps() {
        let frame = Frame::from_f32(2, 1, 3, vec![0.0, 1.0, 0.5, -0.2, 1.7, 0.999]);
        assert_eq!(frame.into_bytes(), vec![0, 255, 127, 0, 255, 254]);
    }

    #[test]
    fn test_pixel_format_from_channels() {
        assert_eq!(PixelFormat::from_channels(3).unwrap(), PixelFormat::Rgb24);
        assert_eq!(PixelFormat::from_channels(4).unwrap(), PixelFormat::Rgba);
        assert!(PixelFormat::Rgba.has_alpha());
        assert!(matches!(
            PixelFormat::from_channels(1),
            Err(EncodeError::UnsupportedPixelFormat { channels: 1 })
        ));
    }

    #[test]
    fn test_widget_value_render() {
        assert_eq!(WidgetValue::Bool(true).render(), "True");
        assert_eq!(WidgetValue::Bool(false).render(), "False");
        assert_eq!(WidgetValue::Int(19).render(), "19");
        assert_eq!(WidgetValue::Float(25.0).render(), "25.0");
        assert_eq!(WidgetValue::Float(0.25).render(), "0.25");
        assert_eq!(WidgetValue::String("yuv420p".into()).render(), "yuv420p");
    }

    #[test]
    fn test_widget_value_parse_literal() {
        assert_eq!(WidgetValue::parse_literal("true"), WidgetValue::Bool(true));
        assert_eq!(WidgetValue::parse_literal("False"), WidgetValue::Bool(false));
        assert_eq!(WidgetValue::parse_literal("18"), WidgetValue::Int(18));
        assert_eq!(WidgetValue::parse_literal("1.5"), WidgetValue::Float(1.5));
        assert_eq!(
            WidgetValue::parse_literal("yuv420p10le"),
            WidgetValue::String("yuv420p10le".into())
        );
    }

    #[test]
    fn test_raw_video_input_arguments() {
        let geometry = FrameGeometry {
            width: 104,
            height: 104,
            pixel_format: PixelFormat::Rgb24,
        };
        let args = EncodeArguments::raw_video_input(&geometry, 25.0);
        assert_eq!(
            args,
            vec!["-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24", "-s", "104x104", "-r", "25", "-i", "-"]
        );
        assert_eq!(geometry.frame_size(), 104 * 104 * 3);
    }

    #[test]
    fn test_metadata_arguments_lead_with_sidecar() {
        let arguments = EncodeArguments {
            program: "ffmpeg".into(),
            input_args: vec!["-i".into(), "-".into()],
            extra_input_args: vec!["-i".into(), "palette.png".into()],
            output_args: vec!["-c:v".into(), "libx264".into()],
            environment: Default::default(),
        };

        assert_eq!(
            arguments.command_args(),
            vec!["-i", "-", "-i", "palette.png", "-c:v", "libx264"]
        );
        let with_metadata = arguments.command_args_with_metadata(Path::new("/tmp/metadata.txt"));
        assert_eq!(&with_metadata[..2], &["-i", "/tmp/metadata.txt"]);
        assert_eq!(&with_metadata[with_metadata.len() - 2..], &["-metadata", "creation_time=now"]);
    }

    #[test]
    fn test_waveform_from_planar_interleaves() {
        let waveform = AudioWaveform::from_planar(vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0]], 8000);
        assert_eq!(waveform.channels, 2);
        assert_eq!(waveform.samples, vec![1.0, -1.0, 2.0, -2.0, 3.0, 0.0]);
        assert_eq!(waveform.to_f32le_bytes().len(), 6 * 4);
        assert!((waveform.duration_seconds() - 3.0 / 8000.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Finalized.to_string(), "finalized");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }
}
