use std::time::Duration;
use ciborium::Value;
use common::sensor::SensorImage;
use tracing::{debug, info};
use crate::codec;
use crate::error::Result;
use crate::transport::{Transport, ZmqTransport};
use crate::{ObjectHandle, Simulator};

pub struct RemoteApi<T: Transport = ZmqTransport> {
    transport: T,
    calls: u64,
}

impl RemoteApi<ZmqTransport> {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let transport = ZmqTransport::connect(host, port, timeout)?;
        info!("Connected to remote API server at {}", transport.endpoint());

        Ok(Self::with_transport(transport))
    }
}

impl<T: Transport> RemoteApi<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport, calls: 0 }
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn call(&mut self, func: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let request = codec::encode_request(func, args)?;
        let reply = self.transport.round_trip(request)?;
        self.calls += 1;

        codec::decode_reply(func, &reply)
    }

    fn call_unit(&mut self, func: &str, args: Vec<Value>) -> Result<()> {
        self.call(func, args).map(|_| ())
    }
}

impl<T: Transport> Simulator for RemoteApi<T> {
    fn set_stepping(&mut self, enabled: bool) -> Result<()> {
        debug!("Stepping mode: {}", enabled);
        self.call_unit("sim.setStepping", vec![Value::Bool(enabled)])
    }

    fn step(&mut self) -> Result<()> {
        self.call_unit("sim.step", vec![])
    }

    fn start_simulation(&mut self) -> Result<()> {
        info!("Starting simulation");
        self.call_unit("sim.startSimulation", vec![])
    }

    fn stop_simulation(&mut self) -> Result<()> {
        info!("Stopping simulation");
        self.call_unit("sim.stopSimulation", vec![])
    }

    fn get_object(&mut self, path: &str) -> Result<ObjectHandle> {
        const FUNC: &str = "sim.getObject";

        let ret = self.call(FUNC, vec![Value::from(path)])?;
        let handle = ret.first().ok_or_else(|| codec::unexpected(FUNC, "nothing"))?;
        let handle = ObjectHandle(codec::integer(FUNC, handle)?);

        debug!("{} -> {:?}", path, handle);

        Ok(handle)
    }

    fn get_vision_sensor_image(&mut self, sensor: ObjectHandle) -> Result<SensorImage> {
        const FUNC: &str = "sim.getVisionSensorImg";

        let ret = self.call(FUNC, vec![Value::from(sensor.0)])?;

        let (data, resolution) = match ret.as_slice() {
            [data, resolution, ..] => (data, resolution),
            _ => return Err(codec::unexpected(FUNC, format!("{} values", ret.len()))),
        };

        let data = codec::bytes(FUNC, data)?;
        let (width, height) = match codec::array(FUNC, resolution)? {
            [width, height] => (codec::integer(FUNC, width)?, codec::integer(FUNC, height)?),
            other => return Err(codec::unexpected(FUNC, format!("a resolution of {} values", other.len()))),
        };

        let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(width), Ok(height)) => (width, height),
            _ => return Err(codec::unexpected(FUNC, format!("a resolution of {}x{}", width, height))),
        };

        let image = SensorImage { width, height, data: data.to_vec() };
        if !image.is_complete() {
            return Err(codec::unexpected(FUNC, format!(
                "{} bytes for a {}x{} image",
                image.data.len(), width, height
            )));
        }

        Ok(image)
    }

    fn set_joint_target_velocity(&mut self, joint: ObjectHandle, velocity: f64) -> Result<()> {
        self.call_unit("sim.setJointTargetVelocity", vec![Value::from(joint.0), Value::Float(velocity)])
    }

    fn set_joint_target_position(&mut self, joint: ObjectHandle, position: f64) -> Result<()> {
        self.call_unit("sim.setJointTargetPosition", vec![Value::from(joint.0), Value::Float(position)])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use crate::codec::encode_reply;
    use crate::RemoteApiError;
    use super::*;

    #[derive(Default)]
    struct ScriptedTransport {
        requests: Vec<Value>,
        replies: VecDeque<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn reply(mut self, ret: Vec<Value>) -> Self {
            self.replies.push_back(encode_reply(vec![
                ("success", Value::Bool(true)),
                ("ret", Value::Array(ret)),
            ]));
            self
        }

        fn fail(mut self, message: &str) -> Self {
            self.replies.push_back(encode_reply(vec![
                ("success", Value::Bool(false)),
                ("error", Value::Text(message.to_owned())),
            ]));
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn round_trip(&mut self, request: Vec<u8>) -> Result<Vec<u8>> {
            self.requests.push(ciborium::from_reader(&request[..]).unwrap());
            Ok(self.replies.pop_front().expect("no scripted reply left"))
        }
    }

    fn func_of(request: &Value) -> &str {
        request.as_map().unwrap()[0].1.as_text().unwrap()
    }

    fn args_of(request: &Value) -> &[Value] {
        request.as_map().unwrap()[1].1.as_array().unwrap()
    }

    #[test]
    fn get_object_sends_the_path_and_returns_the_handle() {
        let mut api = RemoteApi::with_transport(ScriptedTransport::default().reply(vec![Value::from(17)]));

        let handle = api.get_object("/steer_joint").unwrap();
        assert_eq!(handle, ObjectHandle(17));
        assert_eq!(api.calls(), 1);

        let request = &api.transport.requests[0];
        assert_eq!(func_of(request), "sim.getObject");
        assert_eq!(args_of(request), &[Value::Text("/steer_joint".to_owned())]);
    }

    #[test]
    fn vision_sensor_image_is_decoded() {
        let pixels: Vec<u8> = (0..2 * 3 * 3).map(|it| it as u8).collect();
        let transport = ScriptedTransport::default().reply(vec![
            Value::Bytes(pixels.clone()),
            Value::Array(vec![Value::from(2), Value::from(3)]),
        ]);
        let mut api = RemoteApi::with_transport(transport);

        let image = api.get_vision_sensor_image(ObjectHandle(4)).unwrap();
        assert_eq!(image.width, 2);
        assert_eq!(image.height, 3);
        assert_eq!(image.data, pixels);
        assert_eq!(func_of(&api.transport.requests[0]), "sim.getVisionSensorImg");
    }

    #[test]
    fn truncated_vision_sensor_image_is_rejected() {
        let transport = ScriptedTransport::default().reply(vec![
            Value::Bytes(vec![0; 10]),
            Value::Array(vec![Value::from(2), Value::from(3)]),
        ]);
        let mut api = RemoteApi::with_transport(transport);

        assert!(matches!(
            api.get_vision_sensor_image(ObjectHandle(4)),
            Err(RemoteApiError::UnexpectedReturn { .. })
        ));
    }

    #[test]
    fn joint_targets_are_sent_as_floats() {
        let transport = ScriptedTransport::default().reply(vec![]).reply(vec![]);
        let mut api = RemoteApi::with_transport(transport);

        api.set_joint_target_velocity(ObjectHandle(1), 200.0).unwrap();
        api.set_joint_target_position(ObjectHandle(2), -0.25).unwrap();

        let requests = &api.transport.requests;
        assert_eq!(func_of(&requests[0]), "sim.setJointTargetVelocity");
        assert_eq!(args_of(&requests[0]), &[Value::from(1), Value::Float(200.0)]);
        assert_eq!(func_of(&requests[1]), "sim.setJointTargetPosition");
        assert_eq!(args_of(&requests[1]), &[Value::from(2), Value::Float(-0.25)]);
    }

    #[test]
    fn simulator_errors_surface_as_call_errors() {
        let mut api = RemoteApi::with_transport(ScriptedTransport::default().fail("object does not exist"));

        match api.get_object("/missing") {
            Err(RemoteApiError::Call { func, message }) => {
                assert_eq!(func, "sim.getObject");
                assert_eq!(message, "object does not exist");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn stepping_sequence() {
        let transport = ScriptedTransport::default().reply(vec![]).reply(vec![]).reply(vec![]);
        let mut api = RemoteApi::with_transport(transport);

        api.set_stepping(true).unwrap();
        api.start_simulation().unwrap();
        api.step().unwrap();

        let funcs: Vec<_> = api.transport.requests.iter().map(func_of).collect();
        assert_eq!(funcs, ["sim.setStepping", "sim.startSimulation", "sim.step"]);
        assert_eq!(args_of(&api.transport.requests[0]), &[Value::Bool(true)]);
    }
}
