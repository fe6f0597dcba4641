// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;
mod scene;

use args::Args;
use cdr::{CdrLe, Infinite};
use clap::Parser;
use edgefirst_depthcam::{
    camera::timestamp, normals::visualization_msgs::MarkerArray, CameraConfig, ColorFrame,
    DepthCamera, DepthFrame, FrameSink, NormalsFrame, OutputKind, ReflectanceFrame,
};
use edgefirst_schemas::{
    builtin_interfaces::Time,
    geometry_msgs::{Quaternion, Transform, TransformStamped, Vector3},
    sensor_msgs::{CameraInfo, Image, PointCloud2},
    std_msgs::Header,
};
use kanal::{Receiver, Sender};
use scene::{Scene, SceneFrame};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, sleep},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, info_span, trace};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};
use zenoh::{
    bytes::{Encoding, ZBytes},
    pubsub::Publisher,
    qos::{CongestionControl, Priority},
    Session, Wait as _,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Output publishers shared between the sink and the matching listeners.
#[derive(Clone)]
struct Publishers {
    point_cloud: Arc<Publisher<'static>>,
    depth_image: Arc<Publisher<'static>>,
    depth_info: Arc<Publisher<'static>>,
    normals: Arc<Publisher<'static>>,
    reflectance: Arc<Publisher<'static>>,
    image: Arc<Publisher<'static>>,
}

impl Publishers {
    async fn declare(session: &Session, args: &Args, config: &CameraConfig) -> Result<Self, BoxError> {
        let topics = &config.topics;
        Ok(Self {
            point_cloud: declare(session, args.topic(&topics.point_cloud)).await?,
            depth_image: declare(session, args.topic(&topics.depth_image)).await?,
            depth_info: declare(session, args.topic(&topics.depth_info)).await?,
            normals: declare(session, args.topic(&topics.normals)).await?,
            reflectance: declare(session, args.topic(&topics.reflectance)).await?,
            image: declare(session, args.topic(&topics.image)).await?,
        })
    }

    fn get(&self, kind: OutputKind) -> &Arc<Publisher<'static>> {
        match kind {
            OutputKind::PointCloud => &self.point_cloud,
            OutputKind::DepthImage => &self.depth_image,
            OutputKind::DepthInfo => &self.depth_info,
            OutputKind::Normals => &self.normals,
            OutputKind::Reflectance => &self.reflectance,
            OutputKind::Image => &self.image,
        }
    }
}

async fn declare(session: &Session, topic: String) -> Result<Arc<Publisher<'static>>, BoxError> {
    match session
        .declare_publisher(topic.clone())
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
    {
        Ok(v) => Ok(Arc::new(v)),
        Err(e) => {
            error!("Failed to create publisher {}: {:?}", topic, e);
            Err(e)
        }
    }
}

/// Publishes engine output over zenoh and mirrors the device state into a
/// flag read by the capture thread.
struct ZenohSink {
    publishers: Publishers,
    active: Arc<AtomicBool>,
}

impl ZenohSink {
    fn put<T: Serialize>(publisher: &Publisher<'static>, msg: &T, schema: &str) {
        let bytes = match cdr::serialize::<_, _, CdrLe>(msg, Infinite) {
            Ok(v) => ZBytes::from(v),
            Err(e) => {
                error!("{} serialization error: {:?}", schema, e);
                return;
            }
        };
        let enc = Encoding::APPLICATION_CDR.with_schema(schema);

        match publisher.put(bytes).encoding(enc).wait() {
            Ok(_) => trace!("{} message sent", publisher.key_expr()),
            Err(e) => error!("{} message error: {:?}", publisher.key_expr(), e),
        }
    }
}

impl FrameSink for ZenohSink {
    fn set_active(&mut self, active: bool) {
        info!(active, "camera state change");
        self.active.store(active, Ordering::Relaxed);
    }

    fn publish_point_cloud(&mut self, msg: &PointCloud2) {
        Self::put(&self.publishers.point_cloud, msg, "sensor_msgs/msg/PointCloud2");
    }

    fn publish_depth_image(&mut self, msg: &Image) {
        Self::put(&self.publishers.depth_image, msg, "sensor_msgs/msg/Image");
    }

    fn publish_markers(&mut self, msg: &MarkerArray) {
        Self::put(&self.publishers.normals, msg, "visualization_msgs/msg/MarkerArray");
    }

    fn publish_reflectance(&mut self, msg: &Image) {
        Self::put(&self.publishers.reflectance, msg, "sensor_msgs/msg/Image");
    }

    fn publish_camera_info(&mut self, msg: &CameraInfo) {
        Self::put(&self.publishers.depth_info, msg, "sensor_msgs/msg/CameraInfo");
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let stdout_log = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(args.rust_log);

    #[cfg(feature = "tracy")]
    let tracy = args
        .tracy
        .then(|| tracing_tracy::TracyLayer::default().with_filter(args.rust_log));
    #[cfg(not(feature = "tracy"))]
    let tracy: Option<tracing_subscriber::layer::Identity> = None;

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(tracy)
        .init();

    if args.tracy && !cfg!(feature = "tracy") {
        tracing::warn!("tracy requested but the tracy feature is disabled");
    }

    let config = CameraConfig::try_from(&args)?;
    info!(
        width = args.width,
        height = args.height,
        encoding = %config.encoding(),
        cutoff = config.point_cloud_cutoff,
        "depth camera configured"
    );

    let session = zenoh::open(zenoh::Config::try_from(&args)?).await?;
    debug!("opened zenoh session");

    spawn_tf_static(&session, &args).await?;

    let publishers = Publishers::declare(&session, &args, &config).await?;
    let active = Arc::new(AtomicBool::new(false));
    let sink = ZenohSink {
        publishers: publishers.clone(),
        active: active.clone(),
    };
    let camera = Arc::new(DepthCamera::new(config, sink));

    for kind in OutputKind::ALL {
        spawn_matching(camera.clone(), publishers.get(kind).clone(), kind);
    }

    let (tx, rx) = kanal::bounded(2);
    let scene = Scene::new(args.width, args.height, camera.config().hfov);
    thread::Builder::new()
        .name("capture".to_string())
        .spawn({
            let active = active.clone();
            let fps = args.fps.max(1);
            move || capture_thread(scene, tx, active, fps)
        })?;

    thread::Builder::new()
        .name("convert".to_string())
        .spawn({
            let camera = camera.clone();
            let publisher = publishers.image.clone();
            move || convert_thread(rx, camera, publisher)
        })?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

/// Turn zenoh subscriber matching changes into consumer attach/detach.
fn spawn_matching(
    camera: Arc<DepthCamera<ZenohSink>>,
    publisher: Arc<Publisher<'static>>,
    kind: OutputKind,
) {
    tokio::spawn(async move {
        let listener = match publisher.matching_listener().await {
            Ok(v) => v,
            Err(e) => {
                error!("{} matching listener error: {:?}", kind, e);
                return;
            }
        };

        while let Ok(status) = listener.recv_async().await {
            if status.matching() {
                debug!(%kind, "subscriber matched");
                camera.subscribe(kind);
            } else {
                debug!(%kind, "subscriber lost");
                camera.unsubscribe(kind);
            }
        }
    });
}

fn capture_thread(mut scene: Scene, tx: Sender<SceneFrame>, active: Arc<AtomicBool>, fps: u32) {
    let mut target_time = Instant::now();

    loop {
        let interval = if active.load(Ordering::Relaxed) {
            Duration::from_secs_f64(1.0 / fps as f64)
        } else {
            Duration::from_secs(1)
        };

        let stamp = match timestamp() {
            Ok(v) => v,
            Err(e) => {
                error!("timestamp error: {}", e);
                return;
            }
        };
        let frame = info_span!("render").in_scope(|| scene.render(stamp));
        if tx.send(frame).is_err() {
            return;
        }

        target_time += interval;
        let now = Instant::now();
        if target_time > now {
            sleep(target_time - now);
        } else {
            target_time = now;
        }
    }
}

// If the receiver is empty, waits for the next message, otherwise returns the
// most recent message on this receiver. If the receiver is closed, returns None
fn drain_recv<T>(rx: &Receiver<T>) -> Option<T> {
    let mut msg = match rx.try_recv() {
        Err(_) => return None,
        Ok(Some(v)) => v,
        Ok(None) => return rx.recv().ok(),
    };
    while let Ok(Some(v)) = rx.try_recv() {
        msg = v;
    }
    Some(msg)
}

fn convert_thread(
    rx: Receiver<SceneFrame>,
    camera: Arc<DepthCamera<ZenohSink>>,
    image_publisher: Arc<Publisher<'static>>,
) {
    while let Some(frame) = drain_recv(&rx) {
        let (w, h, stamp) = (frame.width, frame.height, frame.stamp);

        let color = ColorFrame::new(&frame.color, w, h).with_format(3, "RGB_INT8");
        camera.on_image_frame(&color.clone().with_stamp(stamp.clone()));
        if camera.is_active() && camera.counters().get(OutputKind::Image) > 0 {
            publish_color(&image_publisher, &color, camera.config().frame_name.clone(), stamp.clone());
        }

        camera.on_depth_frame(&DepthFrame::new(&frame.depth, w, h).with_stamp(stamp.clone()));
        camera.on_normals_frame(&NormalsFrame::new(&frame.normals, w, h).with_stamp(stamp.clone()));
        camera.on_reflectance_frame(
            &ReflectanceFrame::new(&frame.reflectance, w, h).with_stamp(stamp.clone()),
        );
        camera.publish_camera_info(stamp);
    }
}

fn publish_color(publisher: &Publisher<'static>, color: &ColorFrame, frame_id: String, stamp: Time) {
    let msg = Image {
        header: Header { stamp, frame_id },
        height: color.height,
        width: color.width,
        encoding: String::from("rgb8"),
        is_bigendian: 0,
        step: 3 * color.width,
        data: color.data.to_vec(),
    };
    ZenohSink::put(publisher, &msg, "sensor_msgs/msg/Image");
}

async fn spawn_tf_static(session: &Session, args: &Args) -> Result<(), BoxError> {
    let publisher = match session
        .declare_publisher("rt/tf_static".to_string())
        .priority(Priority::Background)
        .congestion_control(CongestionControl::Drop)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to create publisher rt/tf_static: {:?}", e);
            return Err(e);
        }
    };

    let msg = TransformStamped {
        header: Header {
            frame_id: args.base_frame_id.clone(),
            stamp: timestamp().unwrap_or(Time { sec: 0, nanosec: 0 }),
        },
        child_frame_id: args.frame_id.clone(),
        transform: Transform {
            translation: Vector3 {
                x: args.tf_vec[0],
                y: args.tf_vec[1],
                z: args.tf_vec[2],
            },
            rotation: Quaternion {
                x: args.tf_quat[0],
                y: args.tf_quat[1],
                z: args.tf_quat[2],
                w: args.tf_quat[3],
            },
        },
    };

    let msg = ZBytes::from(cdr::serialize::<_, _, CdrLe>(&msg, Infinite)?);
    let enc = Encoding::APPLICATION_CDR.with_schema("geometry_msgs/msg/TransformStamped");

    thread::Builder::new()
        .name("tf_static".to_string())
        .spawn(move || {
            let interval = Duration::from_secs(1);
            let mut target_time = Instant::now() + interval;

            loop {
                if let Err(e) = publisher.put(msg.clone()).encoding(enc.clone()).wait() {
                    error!("rt/tf_static message error: {:?}", e);
                }
                trace!("depthcam publishing rt/tf_static");
                sleep(target_time.saturating_duration_since(Instant::now()));
                target_time += interval
            }
        })?;

    Ok(())
}
